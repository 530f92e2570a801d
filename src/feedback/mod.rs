//! Structured Feedback Module
//!
//! Machine-readable output of a check run:
//! - JSON diagnostic reports with fix suggestions
//! - Module statistics

use serde::{Deserialize, Serialize};

use crate::frontend::ast::{FunctionItem, Module};
use crate::utils::{Diagnostic, ErrorKind, Severity};

// ==================== Structured Error Report ====================

/// One diagnostic, ready for serialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Diagnostic code (e.g., "E0101")
    pub code: String,

    pub severity: Severity,

    pub kind: ErrorKind,

    /// Human-readable message
    pub message: String,

    pub location: Location,

    /// Suggested fixes
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: usize,
    pub column: usize,
    /// Char offsets into the source
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    /// Description of the fix
    pub message: String,

    /// Confidence in this suggestion (0.0 - 1.0)
    pub confidence: f64,
}

impl ErrorReport {
    pub fn from_diagnostic(diagnostic: &Diagnostic, file_name: &str) -> Self {
        let span = diagnostic.span;
        Self {
            code: diagnostic.kind.code().to_string(),
            severity: diagnostic.severity,
            kind: diagnostic.kind,
            message: diagnostic.message.clone(),
            location: Location {
                file: file_name.to_string(),
                line: span.line,
                column: span.column,
                start: span.start,
                end: span.end,
            },
            suggestions: suggestions_for(diagnostic),
        }
    }
}

/// Fix hints for the common mistakes
fn suggestions_for(diagnostic: &Diagnostic) -> Vec<Suggestion> {
    let hint = |message: &str, confidence: f64| Suggestion {
        message: message.to_string(),
        confidence,
    };

    match diagnostic.kind {
        ErrorKind::UnexpectedToken if diagnostic.message.contains("';'") => {
            vec![hint("Statements end with ';' unless they end with a block", 0.9)]
        }
        ErrorKind::UnexpectedEof => vec![hint("Check for an unclosed '{'", 0.8)],
        ErrorKind::TypeRequired => vec![
            hint("Add a type annotation, e.g. `let z: int;`", 0.8),
            hint("Give the variable an initial value so its type can be inferred", 0.7),
        ],
        ErrorKind::ConstViolation => {
            vec![hint("Declare the variable with `var` if it needs to change", 0.8)]
        }
        ErrorKind::ArgumentMismatch => vec![hint(
            "Call arguments are never converted; pass values of the parameter types",
            0.7,
        )],
        ErrorKind::IndexOutOfBounds => vec![hint(
            "Indices start at 0 and must be smaller than the array length",
            0.9,
        )],
        ErrorKind::Redeclaration => vec![
            hint("Rename one of the variables", 0.6),
            hint("Assign to the existing variable instead of redefining it", 0.5),
        ],
        ErrorKind::ImplicitCast => vec![hint(
            "Use a value of the destination type to make the conversion explicit",
            0.5,
        )],
        _ => Vec::new(),
    }
}

// ==================== Check Feedback ====================

/// Result of checking one source file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckFeedback {
    pub success: bool,

    pub source_file: String,

    /// All errors and warnings, in report order
    pub diagnostics: Vec<ErrorReport>,

    pub stats: CheckStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckStats {
    pub function_count: usize,
    pub class_count: usize,
    pub type_count: usize,
    pub error_count: usize,
    pub warning_count: usize,
    /// Lines of code
    pub loc: usize,
}

impl CheckStats {
    pub fn collect(module: &Module, diagnostics: &[Diagnostic], source: &str) -> Self {
        Self {
            function_count: module
                .functions
                .iter()
                .filter(|f| matches!(f, FunctionItem::Function(_)))
                .count(),
            class_count: module.classes.len(),
            type_count: module.types.len(),
            error_count: diagnostics
                .iter()
                .filter(|d| d.severity == Severity::Error)
                .count(),
            warning_count: diagnostics
                .iter()
                .filter(|d| d.severity == Severity::Warning)
                .count(),
            loc: source.lines().filter(|l| !l.trim().is_empty()).count(),
        }
    }
}

impl CheckFeedback {
    pub fn new(
        success: bool,
        source_file: &str,
        diagnostics: &[Diagnostic],
        stats: CheckStats,
    ) -> Self {
        Self {
            success,
            source_file: source_file.to_string(),
            diagnostics: diagnostics
                .iter()
                .map(|d| ErrorReport::from_diagnostic(d, source_file))
                .collect(),
            stats,
        }
    }

    /// Output as JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::frontend::check_source;
    use crate::utils::DiagnosticBuilder;
    use pretty_assertions::assert_eq;

    fn feedback(source: &str) -> CheckFeedback {
        let mut diags = DiagnosticBuilder::new();
        let (ok, module) = check_source(source, &Config::new(), &mut diags);
        let stats = CheckStats::collect(&module, diags.diagnostics(), source);
        CheckFeedback::new(ok, "test.vr", diags.diagnostics(), stats)
    }

    #[test]
    fn test_report_for_clean_source() {
        let fb = feedback("struct P { int x; }\nfunc f() { }\nvar a = 1;\n");
        assert!(fb.success);
        assert!(fb.diagnostics.is_empty());
        assert_eq!(
            fb.stats,
            CheckStats {
                function_count: 2,
                class_count: 0,
                type_count: 1,
                error_count: 0,
                warning_count: 0,
                loc: 3,
            }
        );
    }

    #[test]
    fn test_report_locations_and_suggestions() {
        let fb = feedback("var ok = 1;\nlet z;");
        assert!(!fb.success);
        let report = &fb.diagnostics[0];
        assert_eq!(report.kind, ErrorKind::TypeRequired);
        assert_eq!(report.code, ErrorKind::TypeRequired.code());
        assert_eq!(report.location.file, "test.vr");
        assert_eq!(report.location.line, 2);
        assert_eq!(report.location.column, 1);
        assert_eq!(report.suggestions.len(), 2);
    }

    #[test]
    fn test_json_round_trip() {
        let fb = feedback("var x: int = 2.5;");
        let json = fb.to_json().expect("serializes");
        let back: CheckFeedback = serde_json::from_str(&json).expect("deserializes");
        assert!(back.success);
        assert_eq!(back.stats.warning_count, 1);
        assert_eq!(back.diagnostics[0].severity, Severity::Warning);
        assert!(json.contains("\"kind\": \"ImplicitCast\""));
    }
}
