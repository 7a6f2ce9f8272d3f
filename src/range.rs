//! Turns resolved nodes and validator hints into 0-based editor ranges.
//!
//! Everything upstream of this module speaks 1-based line/column, and
//! everything downstream speaks 0-based. Nothing else converts.

use std::fmt;

use log::debug;

use crate::syntax::SyntaxNode;

/// Position hints supplied by the validator itself, 1-based.
///
/// `end_row`/`end_col` are exclusive: they name the position one past the
/// last character, the same convention as [`SyntaxNode::end`]. Hints and
/// node spans therefore share one conversion in [`to_range`], and a
/// validator that reports an inclusive end gets a range one character
/// shorter than it meant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Hints {
    pub row: Option<u32>,
    pub col: Option<u32>,
    pub end_row: Option<u32>,
    pub end_col: Option<u32>,
}

impl Hints {
    pub fn at(row: u32, col: u32) -> Self {
        Self {
            row: Some(row),
            col: Some(col),
            ..Self::default()
        }
    }

    pub fn spanning(row: u32, col: u32, end_row: u32, end_col: u32) -> Self {
        Self {
            row: Some(row),
            col: Some(col),
            end_row: Some(end_row),
            end_col: Some(end_col),
        }
    }

    fn of_node(node: &SyntaxNode) -> Self {
        Self::spanning(node.start.line, node.start.col, node.end.line, node.end.col)
    }
}

/// A half-open 0-based range. Columns count Unicode scalar values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextRange {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl TextRange {
    pub fn is_empty(&self) -> bool {
        self.start_line == self.end_line && self.start_col == self.end_col
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Information,
    Hint,
}

impl Severity {
    /// Maps a validator severity label. Anything unrecognised is a warning.
    pub fn from_label(label: Option<&str>) -> Self {
        let Some(label) = label.map(str::trim) else {
            return Severity::Warning;
        };
        if label.eq_ignore_ascii_case("error") {
            Severity::Error
        } else if label.eq_ignore_ascii_case("warning") || label.eq_ignore_ascii_case("warn") {
            Severity::Warning
        } else if label.eq_ignore_ascii_case("info") || label.eq_ignore_ascii_case("information") {
            Severity::Information
        } else if label.eq_ignore_ascii_case("hint") {
            Severity::Hint
        } else {
            debug!("unknown severity `{label}`, reporting as warning");
            Severity::Warning
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Information => "info",
            Severity::Hint => "hint",
        };
        f.write_str(name)
    }
}

/// A resolved, renderable diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub range: TextRange,
    pub message: String,
    pub severity: Severity,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}: {}",
            self.range.start_line + 1,
            self.range.start_col + 1,
            self.severity,
            self.message
        )
    }
}

fn zero_based(value: u32) -> u32 {
    value.saturating_sub(1)
}

/// Character at a 0-based position, or `None` when the position is outside the text.
pub fn char_at(lines: &[&str], line: u32, col: u32) -> Option<char> {
    lines.get(line as usize)?.chars().nth(col as usize)
}

/// Computes the range for one error.
///
/// Hints win over the resolved node when they carry a row. A start on an
/// opening parenthesis collapses the range to that single character so a
/// multi-line form is not underlined as a whole.
pub fn to_range(resolved: Option<&SyntaxNode>, hints: &Hints, lines: &[&str]) -> Option<TextRange> {
    let coords = match (hints.row, resolved) {
        (Some(_), _) => *hints,
        (None, Some(node)) => Hints::of_node(node),
        (None, None) => return None,
    };

    let start_line = zero_based(coords.row.unwrap_or(1));
    let start_col = zero_based(coords.col.unwrap_or(1));

    if char_at(lines, start_line, start_col) == Some('(') {
        return Some(TextRange {
            start_line,
            start_col,
            end_line: start_line,
            end_col: start_col + 1,
        });
    }

    let (end_line, end_col) = match (coords.end_row, coords.end_col) {
        (Some(end_row), Some(end_col)) => (zero_based(end_row), zero_based(end_col)),
        _ => (start_line, start_col),
    };

    if (end_line, end_col) < (start_line, start_col) {
        return Some(TextRange {
            start_line,
            start_col,
            end_line: start_line,
            end_col: start_col,
        });
    }

    Some(TextRange {
        start_line,
        start_col,
        end_line,
        end_col,
    })
}
