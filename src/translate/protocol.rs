//! Request and response bodies exchanged with the translation service.
//!
//! All bodies are JSON. The service exposes:
//!
//! | Method | Path                          | Request              | Response            |
//! |--------|-------------------------------|----------------------|---------------------|
//! | GET    | `/health`                     | -                    | any 2xx             |
//! | POST   | `/convert`                    | [`TranslationRequest`] | [`ConvertResponse`] |
//! | POST   | `/convert/tableau-to-m-code`  | `ConnectionInfo`     | [`MCodeResponse`]   |

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Default endpoint paths.
pub mod paths {
    pub const HEALTH: &str = "/health";
    pub const CONVERT: &str = "/convert";
    pub const M_CODE: &str = "/convert/tableau-to-m-code";
}

/// One formula to translate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRequest {
    /// Source formula text.
    pub formula: String,
    /// Table the resulting expression belongs to.
    pub table_name: String,
    /// Internal field name to display name, so the service can emit readable
    /// references.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_mappings: Option<BTreeMap<String, String>>,
}

impl TranslationRequest {
    pub fn new(formula: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            formula: formula.into(),
            table_name: table_name.into(),
            column_mappings: None,
        }
    }

    pub fn with_column_mappings(mut self, mappings: BTreeMap<String, String>) -> Self {
        self.column_mappings = Some(mappings);
        self
    }
}

/// Success body of `POST /convert`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConvertResponse {
    pub dax_expression: String,
}

/// Success body of the M-code endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct MCodeResponse {
    pub m_code: String,
}

/// Outcome of one translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationResult {
    /// Translated expression text, entities already unescaped.
    Translated(String),
    /// The service was found unreachable when probed; no call was made.
    Unavailable,
    /// The call was made and failed.
    Failed {
        /// HTTP status, when the service answered at all.
        status: Option<u16>,
        /// Response body or error description.
        body: String,
    },
}

impl TranslationResult {
    pub fn is_translated(&self) -> bool {
        matches!(self, Self::Translated(_))
    }

    /// The translated text, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Translated(text) => Some(text),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Translated(text) => Some(text),
            _ => None,
        }
    }
}
