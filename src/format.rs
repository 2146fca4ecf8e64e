//! Indentation canonicalizer for generated code blocks.
//!
//! Works on bracket depth alone: a line starting with a closing bracket
//! dedents before it is written, a line ending with an opening bracket
//! indents the lines after it. It does not parse the code and does not check
//! that brackets balance; depth never drops below zero.

use serde::{Deserialize, Serialize};

/// Indentation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    /// Spaces before every non-blank line.
    pub base_indent: usize,
    /// Spaces added per nesting level.
    pub step: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            base_indent: 4,
            step: 4,
        }
    }
}

impl FormatOptions {
    pub fn new(base_indent: usize, step: usize) -> Self {
        Self { base_indent, step }
    }

    pub fn format(&self, code: &str) -> String {
        format_code(code, self.base_indent, self.step)
    }
}

fn opens(line: &str) -> bool {
    line.ends_with(['(', '{', '['])
}

fn closes(line: &str) -> bool {
    line.starts_with([')', '}', ']'])
}

/// Re-indent `code` by bracket depth.
///
/// Blank lines are kept empty; a trailing newline in the input is kept.
#[must_use]
pub fn format_code(code: &str, base_indent: usize, step: usize) -> String {
    let mut out = String::with_capacity(code.len() + code.len() / 2);
    let mut depth: usize = 0;

    for (i, raw) in code.lines().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if closes(line) {
            depth = depth.saturating_sub(1);
        }
        out.push_str(&" ".repeat(base_indent + depth * step));
        out.push_str(line);
        if opens(line) {
            depth += 1;
        }
    }

    if code.ends_with('\n') {
        out.push('\n');
    }
    out
}
