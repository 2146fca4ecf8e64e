//! Typed predicates over [`ConnectionInfo`] fields.
//!
//! Conditions are plain data loaded from configuration and evaluated by
//! [`Condition::evaluate`]; nothing from the config file is ever executed.
//!
//! ```toml
//! conditions = [
//!     { field = "class_type", op = "equals", value = "sqlserver" },
//!     { field = "raw_query", op = "is_set" },
//!     { field = "property:authentication", op = "not_equals", value = "oauth" },
//! ]
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::connection::ConnectionInfo;

/// Prefix selecting an entry of `additional_properties`.
const PROPERTY_PREFIX: &str = "property:";

/// The [`ConnectionInfo`] field a condition reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Field {
    ClassType,
    Server,
    Database,
    Schema,
    Table,
    RawQuery,
    FilePath,
    /// An entry of `additional_properties`.
    Property(String),
}

impl Field {
    /// Read the field from `info`; empty strings count as unset.
    pub fn read<'a>(&self, info: &'a ConnectionInfo) -> Option<&'a str> {
        let value = match self {
            Field::ClassType => Some(info.class_type.as_str()),
            Field::Server => info.server.as_deref(),
            Field::Database => info.database.as_deref(),
            Field::Schema => info.schema.as_deref(),
            Field::Table => info.table.as_deref(),
            Field::RawQuery => info.raw_query.as_deref(),
            Field::FilePath => info.file_path.as_deref(),
            Field::Property(key) => info.additional_properties.get(key).map(String::as_str),
        };
        value.filter(|v| !v.trim().is_empty())
    }
}

impl TryFrom<String> for Field {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let field = match s.as_str() {
            "class_type" => Field::ClassType,
            "server" => Field::Server,
            "database" => Field::Database,
            "schema" => Field::Schema,
            "table" => Field::Table,
            "raw_query" => Field::RawQuery,
            "file_path" => Field::FilePath,
            other => match other.strip_prefix(PROPERTY_PREFIX) {
                Some(key) if !key.is_empty() => Field::Property(key.to_string()),
                _ => {
                    return Err(format!(
                        "unknown condition field '{other}'; expected a ConnectionInfo field or 'property:<key>'"
                    ))
                }
            },
        };
        Ok(field)
    }
}

impl From<Field> for String {
    fn from(field: Field) -> Self {
        field.to_string()
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::ClassType => write!(f, "class_type"),
            Field::Server => write!(f, "server"),
            Field::Database => write!(f, "database"),
            Field::Schema => write!(f, "schema"),
            Field::Table => write!(f, "table"),
            Field::RawQuery => write!(f, "raw_query"),
            Field::FilePath => write!(f, "file_path"),
            Field::Property(key) => write!(f, "{PROPERTY_PREFIX}{key}"),
        }
    }
}

/// Comparison applied to a field. String comparisons ignore ASCII case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    StartsWith,
    EndsWith,
    /// The field is present and non-blank; `value` is ignored.
    IsSet,
    /// The field is absent or blank; `value` is ignored.
    IsEmpty,
}

/// One predicate: `field op value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub field: Field,
    pub op: Operator,
    #[serde(default)]
    pub value: String,
}

impl Condition {
    pub fn new(field: Field, op: Operator, value: impl Into<String>) -> Self {
        Self {
            field,
            op,
            value: value.into(),
        }
    }

    pub fn equals(field: Field, value: impl Into<String>) -> Self {
        Self::new(field, Operator::Equals, value)
    }

    pub fn is_set(field: Field) -> Self {
        Self::new(field, Operator::IsSet, "")
    }

    pub fn is_empty(field: Field) -> Self {
        Self::new(field, Operator::IsEmpty, "")
    }

    /// Evaluate against a connection. A missing field fails every comparison
    /// except `not_equals` and `is_empty`.
    pub fn evaluate(&self, info: &ConnectionInfo) -> bool {
        let actual = self.field.read(info);
        let expected = self.value.to_ascii_lowercase();
        let lower = actual.map(str::to_ascii_lowercase);

        match self.op {
            Operator::IsSet => actual.is_some(),
            Operator::IsEmpty => actual.is_none(),
            Operator::Equals => lower.is_some_and(|v| v == expected),
            Operator::NotEquals => !lower.is_some_and(|v| v == expected),
            Operator::Contains => lower.is_some_and(|v| v.contains(&expected)),
            Operator::StartsWith => lower.is_some_and(|v| v.starts_with(&expected)),
            Operator::EndsWith => lower.is_some_and(|v| v.ends_with(&expected)),
        }
    }
}
