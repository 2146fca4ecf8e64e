//! Error types for calculation graph operations.

use thiserror::Error;

/// Result type for calculation operations.
pub type CalcResult<T> = Result<T, CalcError>;

/// Errors raised while resolving calculation dependencies.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalcError {
    /// The requested calculation id does not exist in the graph.
    #[error("calculation not found: {0}")]
    NotFound(String),

    /// Calculations reference each other in a loop.
    ///
    /// The path starts and ends with the same id.
    #[error("cyclic dependency: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),
}

