//! Textual triage of compiler output.
//!
//! The classifier does not understand any compiler's message format. It looks
//! for `error:` / `warning:` markers and a handful of well-known phrases, and
//! keeps at most [`MAX_DIAGNOSTICS`] entries plus one overflow entry.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of diagnostics kept verbatim.
pub const MAX_DIAGNOSTICS: usize = 10;

/// Phrase → category, checked in order on error lines.
const ERROR_PATTERNS: &[(&str, Category)] = &[
    ("no such file or directory", Category::MissingFile),
    ("undefined reference", Category::LinkError),
    ("permission denied", Category::PermissionDenied),
    ("syntax error", Category::SyntaxError),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    MissingFile,
    LinkError,
    PermissionDenied,
    SyntaxError,
    Other,
    /// Summary entry standing in for this many dropped diagnostics.
    Overflow(usize),
}

impl Category {
    /// Actionable hint for well-known failures.
    pub fn hint(self) -> Option<&'static str> {
        match self {
            Self::MissingFile => Some("Missing file/header - Check include paths"),
            Self::LinkError => Some("Linking error - Check library paths"),
            Self::PermissionDenied => Some("Permission denied - Check file permissions"),
            Self::SyntaxError => Some("Syntax error in source code"),
            Self::Other | Self::Overflow(_) => None,
        }
    }
}

/// One classified output line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub category: Category,
    pub raw_line: String,
}

impl Diagnostic {
    fn overflow(count: usize) -> Self {
        Self {
            severity: Severity::Error,
            category: Category::Overflow(count),
            raw_line: format!("... and {count} more errors"),
        }
    }

    pub fn is_overflow(&self) -> bool {
        matches!(self.category, Category::Overflow(_))
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_overflow() {
            return f.write_str(&self.raw_line);
        }
        let marker = match self.severity {
            Severity::Error => "[E]",
            Severity::Warning => "[W]",
        };
        match self.category.hint() {
            Some(hint) => write!(f, "{marker} {hint}"),
            None => write!(f, "{marker} {}", self.raw_line),
        }
    }
}

/// Classify a single line, or `None` if it carries no marker.
pub fn classify_line(line: &str) -> Option<Diagnostic> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let lower = line.to_lowercase();

    let (severity, category) = if lower.contains("error:") {
        let category = ERROR_PATTERNS
            .iter()
            .find(|(phrase, _)| lower.contains(phrase))
            .map_or(Category::Other, |(_, category)| *category);
        (Severity::Error, category)
    } else if lower.contains("warning:") {
        (Severity::Warning, Category::Other)
    } else {
        return None;
    };

    Some(Diagnostic {
        severity,
        category,
        raw_line: line.to_string(),
    })
}

/// Classify every line of `text`, capped at [`MAX_DIAGNOSTICS`].
pub fn classify(text: &str) -> Vec<Diagnostic> {
    classify_lines(text.lines())
}

/// Classify lines from several sources as one stream.
pub fn classify_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<Diagnostic> {
    let mut kept = Vec::new();
    let mut dropped = 0usize;

    for diagnostic in lines.into_iter().filter_map(classify_line) {
        if kept.len() < MAX_DIAGNOSTICS {
            kept.push(diagnostic);
        } else {
            dropped += 1;
        }
    }

    if dropped > 0 {
        kept.push(Diagnostic::overflow(dropped));
    }
    kept
}

/// Human-readable summary, one diagnostic per line.
pub fn render_summary(diagnostics: &[Diagnostic]) -> String {
    if diagnostics.is_empty() {
        return "No specific errors detected in output".to_string();
    }
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_header() {
        let diags = classify("main.cpp:1:10: fatal error: foo.h: No such file or directory\n");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Error);
        assert_eq!(diags[0].category, Category::MissingFile);
    }

    #[test]
    fn test_priority_order() {
        let line = "ld: error: undefined reference to `x` (Permission denied)";
        assert_eq!(classify_line(line).unwrap().category, Category::LinkError);
    }

    #[test]
    fn test_warning_and_noise() {
        let text = "compiling...\n  main.cpp:4: WARNING: unused variable 'x'\n\n";
        let diags = classify(text);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Warning);
        assert_eq!(diags[0].category, Category::Other);
        assert_eq!(diags[0].raw_line, "main.cpp:4: WARNING: unused variable 'x'");
    }

    #[test]
    fn test_error_wins_over_warning() {
        let diag = classify_line("warning: treated as error: syntax error").unwrap();
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.category, Category::SyntaxError);
    }

    #[test]
    fn test_cap_with_overflow_entry() {
        let text: String = (1..=12).map(|i| format!("main.cpp:{i}: error: problem {i}\n")).collect();
        let diags = classify(&text);
        assert_eq!(diags.len(), MAX_DIAGNOSTICS + 1);
        assert_eq!(diags[9].raw_line, "main.cpp:10: error: problem 10");
        assert_eq!(diags[10].category, Category::Overflow(2));
        assert_eq!(diags[10].raw_line, "... and 2 more errors");
    }

    #[test]
    fn test_exactly_ten_has_no_overflow() {
        let text: String = (0..10).map(|i| format!("error: e{i}\n")).collect();
        assert!(classify(&text).iter().all(|d| !d.is_overflow()));
    }

    #[test]
    fn test_render_summary() {
        assert_eq!(render_summary(&[]), "No specific errors detected in output");
        let diags = classify("a.o: error: undefined reference to `main'\nx.cpp:2: error: expected ';'");
        assert_eq!(
            render_summary(&diags),
            "[E] Linking error - Check library paths\n[E] x.cpp:2: error: expected ';'"
        );
    }
}
