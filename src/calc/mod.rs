//! Calculated fields and their dependency graph.
//!
//! Calculations reference each other by internal id (`[Calculation_123]`).
//! The graph is built once per migration run; the resolver walks it to
//! produce translation order.
//!
//! ```text
//! formula text ──[references]──▶ dependency ids
//!                                     │
//! CalculationGraph ──[resolve]──▶ dependency-first node order
//! ```

mod error;
mod graph;
pub mod references;
mod resolve;

pub use error::{CalcError, CalcResult};
pub use graph::{CalculationGraph, CalculationNode, CalculationRecord};
pub use references::extract_references;
pub use resolve::{resolve, resolve_all, BlockedNode, DependencyResolver, Resolution};
