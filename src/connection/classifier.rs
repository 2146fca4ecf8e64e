//! Normalization of workbook connections into [`ConnectionInfo`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::descriptor::{ConnectionDescriptor, RelationDescriptor};

/// Canonical class for every direct-file Excel variant.
pub const EXCEL_CLASS: &str = "excel";

/// Escapes left in custom SQL text, decoded in this order.
const QUERY_ESCAPES: &[(&str, &str)] = &[
    ("&#13;&#10;", "\n"),
    ("&#13;", "\n"),
    ("&#10;", "\n"),
    ("&apos;", "'"),
    ("&quot;", "\""),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&amp;", "&"),
];

/// A connection flattened to the fields code generation needs.
///
/// At most one of `table` and `raw_query` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Source kind, e.g. `excel`, `sqlserver`, `textscan`.
    pub class_type: String,
    pub server: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub table: Option<String>,
    pub raw_query: Option<String>,
    pub file_path: Option<String>,
    /// Every raw attribute of the adopted connection.
    pub additional_properties: BTreeMap<String, String>,
}

impl ConnectionInfo {
    /// Whether the datasource reads custom SQL.
    pub fn is_query(&self) -> bool {
        self.raw_query.is_some()
    }

    /// Look up a named field; unknown names fall through to
    /// `additional_properties`.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "class_type" => Some(self.class_type.as_str()).filter(|s| !s.is_empty()),
            "server" => self.server.as_deref(),
            "database" => self.database.as_deref(),
            "schema" => self.schema.as_deref(),
            "table" => self.table.as_deref(),
            "raw_query" => self.raw_query.as_deref(),
            "file_path" => self.file_path.as_deref(),
            other => self.additional_properties.get(other).map(String::as_str),
        }
    }
}

/// Classify a connection and the relation read through it.
///
/// A federated connection adopts its first named sub-connection that declares
/// a class; later sub-connections are ignored.
pub fn classify(
    connection: &ConnectionDescriptor,
    relation: Option<&RelationDescriptor>,
) -> ConnectionInfo {
    let adopted = if connection.is_federated() {
        connection
            .named_connections
            .iter()
            .filter_map(|named| named.connection.as_ref())
            .find(|inner| inner.has_class())
    } else {
        Some(connection)
    };

    let mut info = match adopted {
        Some(inner) => from_concrete(inner),
        None => {
            debug!("federated connection without a classed sub-connection");
            ConnectionInfo {
                class_type: connection.class.clone(),
                additional_properties: connection.attributes.clone(),
                ..ConnectionInfo::default()
            }
        }
    };

    match relation {
        Some(RelationDescriptor::Query(text)) => {
            info.raw_query = Some(unescape_query(text));
            info.table = None;
        }
        Some(RelationDescriptor::Table(name)) => {
            let (schema, table) = split_table_name(name);
            if schema.is_some() {
                info.schema = schema;
            }
            info.table = Some(table);
            info.raw_query = None;
        }
        None => {}
    }

    info
}

fn from_concrete(connection: &ConnectionDescriptor) -> ConnectionInfo {
    let class = connection.class.trim();
    let is_excel = class.to_ascii_lowercase().starts_with(EXCEL_CLASS);

    let file_path = match (connection.attr("directory"), connection.attr("filename")) {
        (Some(dir), Some(file)) if !is_excel && !is_absolute(file) => {
            Some(format!("{}/{}", dir.trim_end_matches(['/', '\\']), file))
        }
        (_, file) => file.map(str::to_string),
    };

    ConnectionInfo {
        class_type: if is_excel {
            EXCEL_CLASS.to_string()
        } else {
            class.to_string()
        },
        server: connection.attr("server").map(str::to_string),
        database: connection.attr("dbname").map(str::to_string),
        schema: connection.attr("schema").map(str::to_string),
        table: None,
        raw_query: None,
        file_path,
        additional_properties: connection.attributes.clone(),
    }
}

fn is_absolute(path: &str) -> bool {
    path.starts_with('/') || path.starts_with('\\') || path.get(1..2) == Some(":")
}

/// Decode the escapes custom SQL carries in a workbook.
pub fn unescape_query(text: &str) -> String {
    let decoded = QUERY_ESCAPES
        .iter()
        .fold(text.trim().to_string(), |acc, (from, to)| acc.replace(from, to));
    decoded.trim().to_string()
}

/// Split `[schema].[table]` into its parts; brackets are removed.
pub fn split_table_name(name: &str) -> (Option<String>, String) {
    let name = name.trim();
    if let Some((schema, table)) = name.split_once("].[") {
        let schema = schema.trim_start_matches('[');
        let table = table.trim_end_matches(']');
        return (Some(schema.to_string()), table.to_string());
    }
    let table = name
        .strip_prefix('[')
        .and_then(|n| n.strip_suffix(']'))
        .unwrap_or(name);
    (None, table.to_string())
}
