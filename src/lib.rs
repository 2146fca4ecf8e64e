//! # bimigrate
//!
//! Migrates Tableau calculated fields and datasource bindings to Power BI
//! (DAX measures/columns and M-code table queries).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  Workbook (.twb XML)                     │
//! └─────────────────────────────────────────────────────────┘
//!                │ [twb]                      │ [twb]
//!                ▼                            ▼
//! ┌──────────────────────────┐  ┌──────────────────────────┐
//! │  CalculationGraph        │  │  DataSource descriptors  │
//! │  + references, resolve   │  │  + connection::classify  │
//! └──────────────────────────┘  └──────────────────────────┘
//!                │ dependency-first           │ ConnectionInfo
//!                ▼                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │   translate::TranslationClient  ──(unavailable/failed)──▶│
//! │                                      fallback templates  │
//! └─────────────────────────────────────────────────────────┘
//!                              │ [format]
//!                              ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                   MigrationReport                        │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod calc;
pub mod config;
pub mod connection;
pub mod fallback;
pub mod format;
pub mod migrate;
pub mod translate;
pub mod twb;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::calc::{
        extract_references, resolve, resolve_all, CalcError, CalculationGraph, CalculationNode,
        CalculationRecord,
    };
    pub use crate::config::Settings;
    pub use crate::connection::{classify, ConnectionDescriptor, ConnectionInfo, DataSource};
    pub use crate::fallback::{Condition, FallbackSelector, SourceRule};
    pub use crate::format::{format_code, FormatOptions};
    pub use crate::migrate::{MigrationReport, MigrationWarning, Migrator};
    pub use crate::translate::{TranslationClient, TranslationResult};
    pub use crate::twb::Workbook;
}

pub use migrate::{MigrationReport, Migrator};
pub use twb::Workbook;
