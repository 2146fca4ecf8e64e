//! Extraction of calculation references from formula text.
//!
//! Tableau refers to another calculated field by its internal name in square
//! brackets, e.g. `SUM([Calculation_1029]) / [Sales]`. Only bracketed names
//! with the `Calculation_` prefix followed by digits are calculation
//! references; plain column references like `[Sales]` are not.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Prefix Tableau assigns to calculated field identifiers.
pub const CALCULATION_PREFIX: &str = "Calculation_";

/// Pattern for detecting calculation references (e.g., `[Calculation_123]`)
static REFERENCE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"\[({CALCULATION_PREFIX}\d+)\]")).unwrap());

/// Extract the distinct calculation identifiers referenced by `formula`.
///
/// Identifiers are returned without brackets, in order of first occurrence.
/// Malformed bracket content is ignored.
#[must_use]
pub fn extract_references(formula: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    REFERENCE_PATTERN
        .captures_iter(formula)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|id| seen.insert(*id))
        .map(str::to_string)
        .collect()
}
