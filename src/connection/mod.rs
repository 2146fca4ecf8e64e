//! Datasource connections.
//!
//! A workbook datasource pairs a connection (possibly federated over several
//! named sub-connections) with a relation. The classifier flattens both into
//! a [`ConnectionInfo`] that code generation works from.

mod classifier;
mod descriptor;

pub use classifier::{classify, split_table_name, unescape_query, ConnectionInfo, EXCEL_CLASS};
pub use descriptor::{
    ConnectionDescriptor, DataSource, NamedConnection, RelationDescriptor, FEDERATED_CLASS,
};
