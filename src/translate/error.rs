//! Translation-service error types.

use std::time::Duration;
use thiserror::Error;

/// Result type for translation-service calls.
pub type TranslateResult<T> = Result<T, TranslateError>;

/// Errors that can occur while talking to the translation service.
#[derive(Error, Debug)]
pub enum TranslateError {
    /// The request could not be sent or the connection dropped.
    #[error("request to translation service failed: {0}")]
    Transport(String),

    /// No response within the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The service answered with a non-success status.
    #[error("translation service returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, kept for diagnostics.
        body: String,
    },

    /// The client could not be configured.
    #[error("invalid translation configuration: {0}")]
    InvalidConfig(String),

    /// Failed to serialize the request body.
    #[error("failed to serialize request: {0}")]
    SerializeFailed(#[source] serde_json::Error),

    /// Failed to deserialize a success response.
    #[error("failed to deserialize response: {0}")]
    DeserializeFailed(#[source] serde_json::Error),
}

impl TranslateError {
    /// Create a status error.
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Check if retrying the same request might succeed.
    ///
    /// Client errors (4xx other than 429) and encoding problems are final.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::InvalidConfig(_) | Self::SerializeFailed(_) | Self::DeserializeFailed(_) => false,
        }
    }
}

impl From<reqwest::Error> for TranslateError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
