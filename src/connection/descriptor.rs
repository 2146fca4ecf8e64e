//! Raw connection descriptors as they appear in a workbook.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Outer class of a composite connection.
pub const FEDERATED_CLASS: &str = "federated";

/// A `<connection>` element: its class, attributes, and nested named connections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    /// Connection class (`federated`, `excel-direct`, `sqlserver`, ...).
    pub class: String,
    /// All attributes of the element, including `class`.
    pub attributes: BTreeMap<String, String>,
    /// Sub-connections of a federated connection, in document order.
    pub named_connections: Vec<NamedConnection>,
}

impl ConnectionDescriptor {
    pub fn new(class: impl Into<String>) -> Self {
        let class = class.into();
        let mut attributes = BTreeMap::new();
        if !class.is_empty() {
            attributes.insert("class".to_string(), class.clone());
        }
        Self {
            class,
            attributes,
            named_connections: Vec::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Builder-style named connection.
    pub fn with_named(mut self, name: impl Into<String>, connection: ConnectionDescriptor) -> Self {
        self.named_connections.push(NamedConnection {
            name: name.into(),
            caption: None,
            connection: Some(connection),
        });
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn is_federated(&self) -> bool {
        self.class.eq_ignore_ascii_case(FEDERATED_CLASS)
    }

    /// Whether the element declares a class at all.
    pub fn has_class(&self) -> bool {
        !self.class.trim().is_empty()
    }
}

/// A `<named-connection>` wrapper inside a federated connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedConnection {
    pub name: String,
    pub caption: Option<String>,
    pub connection: Option<ConnectionDescriptor>,
}

/// What a datasource reads: a named table or a literal query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RelationDescriptor {
    /// `<relation type='table'>`: the table name, possibly `[schema].[table]`.
    Table(String),
    /// `<relation type='text'>`: custom SQL, still carrying workbook escapes.
    Query(String),
}

/// A workbook datasource: a named connection plus the relation it reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    /// Internal name (`federated.0abc...`).
    pub name: String,
    /// Display caption; used as the target table name.
    pub caption: String,
    pub connection: ConnectionDescriptor,
    pub relation: Option<RelationDescriptor>,
}

impl DataSource {
    /// The name the migrated table should carry.
    pub fn table_name(&self) -> &str {
        if self.caption.is_empty() {
            &self.name
        } else {
            &self.caption
        }
    }
}
