//! Workbook loading errors.

use std::path::PathBuf;

use thiserror::Error;

pub type WorkbookResult<T> = Result<T, WorkbookError>;

#[derive(Debug, Error)]
pub enum WorkbookError {
    #[error("XML error at byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("Failed to read workbook {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("<{element}> is missing required attribute '{attribute}'")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },
}

impl WorkbookError {
    pub fn missing(element: &'static str, attribute: &'static str) -> Self {
        Self::MissingAttribute { element, attribute }
    }
}
