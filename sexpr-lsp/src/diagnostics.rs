//! Rendering of findings as LSP diagnostics.

use sexpr_lint::{Finding, Severity, TextRange};
use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, Position, Range};
use unicode_segmentation::UnicodeSegmentation;

pub const SOURCE: &str = "sexpr-lint";

pub fn to_lsp_diagnostics(findings: &[Finding], text: &str) -> Vec<Diagnostic> {
    let lines: Vec<&str> = text.lines().collect();
    findings
        .iter()
        .map(|finding| to_lsp_diagnostic(finding, &lines))
        .collect()
}

fn to_lsp_diagnostic(finding: &Finding, lines: &[&str]) -> Diagnostic {
    Diagnostic {
        range: to_lsp_range(&finding.range, lines),
        severity: Some(to_lsp_severity(finding.severity)),
        source: Some(SOURCE.to_string()),
        message: finding.message.clone(),
        ..Default::default()
    }
}

fn to_lsp_severity(severity: Severity) -> DiagnosticSeverity {
    match severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
        Severity::Information => DiagnosticSeverity::INFORMATION,
        Severity::Hint => DiagnosticSeverity::HINT,
    }
}

/// Point ranges are widened to the grapheme cluster they sit on so the
/// editor has something to underline.
fn to_lsp_range(range: &TextRange, lines: &[&str]) -> Range {
    let end_col = if range.is_empty() {
        range
            .start_col
            .saturating_add(grapheme_width(lines, range.start_line, range.start_col))
    } else {
        range.end_col
    };

    Range {
        start: to_position(lines, range.start_line, range.start_col),
        end: to_position(lines, range.end_line, end_col),
    }
}

/// Number of characters in the grapheme cluster starting at `col`, or 0.
fn grapheme_width(lines: &[&str], line: u32, col: u32) -> u32 {
    let Some(text) = lines.get(line as usize) else {
        return 0;
    };

    let mut offset = 0;
    for grapheme in text.graphemes(true) {
        let width = grapheme.chars().count() as u32;
        if offset == col {
            return width;
        }
        if offset > col {
            break;
        }
        offset += width;
    }
    0
}

/// Converts a character column to UTF-16 code units, as LSP expects.
fn to_position(lines: &[&str], line: u32, col: u32) -> Position {
    let character = match lines.get(line as usize) {
        Some(text) => {
            let (chars, units) = text
                .chars()
                .take(col as usize)
                .fold((0u32, 0u32), |(chars, units), c| {
                    (chars + 1, units + c.len_utf16() as u32)
                });
            // Columns past the end of the line stay past the end.
            units.saturating_add(col - chars)
        }
        None => col,
    };
    Position { line, character }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(range: TextRange, severity: Severity) -> Finding {
        Finding {
            range,
            message: "problem".to_string(),
            severity,
        }
    }

    fn text_range(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> TextRange {
        TextRange {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    fn lsp_range(start: (u32, u32), end: (u32, u32)) -> Range {
        Range {
            start: Position {
                line: start.0,
                character: start.1,
            },
            end: Position {
                line: end.0,
                character: end.1,
            },
        }
    }

    #[test]
    fn test_diagnostic_fields() {
        let diagnostics = to_lsp_diagnostics(
            &[finding(text_range(0, 1, 0, 3), Severity::Error)],
            "(abc)",
        );
        assert_eq!(diagnostics.len(), 1);
        let diagnostic = &diagnostics[0];
        assert_eq!(diagnostic.range, lsp_range((0, 1), (0, 3)));
        assert_eq!(diagnostic.severity, Some(DiagnosticSeverity::ERROR));
        assert_eq!(diagnostic.source.as_deref(), Some(SOURCE));
        assert_eq!(diagnostic.message, "problem");
    }

    #[test]
    fn test_severities() {
        assert_eq!(to_lsp_severity(Severity::Error), DiagnosticSeverity::ERROR);
        assert_eq!(to_lsp_severity(Severity::Warning), DiagnosticSeverity::WARNING);
        assert_eq!(to_lsp_severity(Severity::Information), DiagnosticSeverity::INFORMATION);
        assert_eq!(to_lsp_severity(Severity::Hint), DiagnosticSeverity::HINT);
    }

    #[test]
    fn test_columns_become_utf16_units() {
        // The emoji is one character but two UTF-16 code units.
        let lines = ["{:😀 1 :b 2}"];
        let range = to_lsp_range(&text_range(0, 6, 0, 8), &lines);
        assert_eq!(range, lsp_range((0, 7), (0, 9)));
    }

    #[test]
    fn test_point_is_widened_to_one_grapheme() {
        let lines = ["{:a 1}"];
        let range = to_lsp_range(&text_range(0, 4, 0, 4), &lines);
        assert_eq!(range, lsp_range((0, 4), (0, 5)));

        // `e` followed by a combining acute accent is one grapheme of two characters.
        let lines = ["(e\u{301})"];
        let range = to_lsp_range(&text_range(0, 1, 0, 1), &lines);
        assert_eq!(range, lsp_range((0, 1), (0, 3)));
    }

    #[test]
    fn test_point_past_end_of_line_stays_a_point() {
        let lines = ["(a)"];
        let range = to_lsp_range(&text_range(0, 9, 0, 9), &lines);
        assert_eq!(range, lsp_range((0, 9), (0, 9)));

        let range = to_lsp_range(&text_range(5, 0, 5, 0), &lines);
        assert_eq!(range, lsp_range((5, 0), (5, 0)));
    }

    #[test]
    fn test_huge_columns_saturate() {
        // Wide characters add UTF-16 units on top of a column already at the limit.
        let lines = ["😀😀"];
        let range = to_lsp_range(&text_range(0, u32::MAX, 0, u32::MAX), &lines);
        assert_eq!(range, lsp_range((0, u32::MAX), (0, u32::MAX)));

        let range = to_lsp_range(&text_range(0, u32::MAX - 1, 0, u32::MAX), &lines);
        assert_eq!(range, lsp_range((0, u32::MAX), (0, u32::MAX)));
    }
}
