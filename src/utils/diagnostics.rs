//! Diagnostic accumulation
//!
//! Lexer, parser and analyzer push into one builder and keep going, so a single
//! run reports every independent problem it finds.

use serde::{Deserialize, Serialize};

use crate::utils::{Error, Span};

/// Category a diagnostic is tagged with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    UnknownChar,
    UnterminatedLiteral,
    MalformedNumber,
    UnexpectedToken,
    UnexpectedEof,
    InvalidSyntax,
    UndefinedSymbol,
    Redeclaration,
    TypeRequired,
    TypeMismatch,
    ArgumentMismatch,
    ConstViolation,
    IndexOutOfBounds,
    InvalidIndex,
    InvalidCondition,
    DuplicateDefinition,
    InvalidMember,
    InvalidType,
    InvalidCall,
    ImplicitCast,
}

impl ErrorKind {
    /// Stable code printed next to the message
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownChar => "E0001",
            Self::UnterminatedLiteral => "E0002",
            Self::MalformedNumber => "E0003",
            Self::UnexpectedToken => "E0100",
            Self::UnexpectedEof => "E0101",
            Self::InvalidSyntax => "E0102",
            Self::UndefinedSymbol => "E0200",
            Self::Redeclaration => "E0201",
            Self::TypeRequired => "E0202",
            Self::TypeMismatch => "E0203",
            Self::ArgumentMismatch => "E0204",
            Self::ConstViolation => "E0205",
            Self::IndexOutOfBounds => "E0206",
            Self::InvalidIndex => "E0207",
            Self::InvalidCondition => "E0208",
            Self::DuplicateDefinition => "E0209",
            Self::InvalidMember => "E0210",
            Self::InvalidType => "E0211",
            Self::InvalidCall => "E0212",
            Self::ImplicitCast => "W0001",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A single reported problem
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub severity: Severity,
    pub message: String,
    pub span: Span,
}

/// Collects diagnostics in the order they are reported
#[derive(Debug, Clone)]
pub struct DiagnosticBuilder {
    diagnostics: Vec<Diagnostic>,
    prefix: String,
}

impl DiagnosticBuilder {
    pub fn new() -> Self {
        Self::with_prefix("This program")
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            diagnostics: Vec::new(),
            prefix: prefix.into(),
        }
    }

    /// Record an error
    pub fn error(&mut self, error: Error) {
        log::debug!("diagnostic at {}: {}", error.span(), error);
        self.diagnostics.push(Diagnostic {
            kind: error.kind(),
            severity: Severity::Error,
            message: error.to_string(),
            span: error.span(),
        });
    }

    /// Record a warning; warnings never fail verification
    pub fn warning(&mut self, kind: ErrorKind, message: impl Into<String>, span: Span) {
        let message = message.into();
        log::warn!("{} at {}", message, span);
        self.diagnostics.push(Diagnostic {
            kind,
            severity: Severity::Warning,
            message,
            span,
        });
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// The offending source line followed by a caret run under the span
    pub fn code_position(&self, source: &str, span: Span) -> String {
        let line_text = source.lines().nth(span.line.saturating_sub(1)).unwrap_or("");
        let width = span.len().max(1);
        let gutter = span.line.to_string();
        format!(
            "{} | {}\n{} | {}{}",
            gutter,
            line_text,
            " ".repeat(gutter.len()),
            " ".repeat(span.column.saturating_sub(1)),
            "^".repeat(width)
        )
    }

    /// Format one diagnostic with its code position
    pub fn format(&self, source: &str, diagnostic: &Diagnostic) -> String {
        format!(
            "{}: {}[{}]: {} at {}\n{}",
            self.prefix,
            diagnostic.severity,
            diagnostic.kind.code(),
            diagnostic.message,
            diagnostic.span,
            self.code_position(source, diagnostic.span)
        )
    }

    /// Format every diagnostic, in report order
    pub fn render(&self, source: &str) -> Vec<String> {
        self.diagnostics
            .iter()
            .map(|d| self.format(source, d))
            .collect()
    }
}

impl Default for DiagnosticBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_errors_and_warnings_are_counted_separately() {
        let mut diags = DiagnosticBuilder::new();
        diags.warning(ErrorKind::ImplicitCast, "truncation", Span::dummy());
        assert!(!diags.has_errors());
        diags.error(Error::UnknownChar { ch: '$', span: Span::new(3, 4, 1, 4) });
        assert!(diags.has_errors());
        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.warning_count(), 1);
        assert_eq!(diags.diagnostics()[1].kind, ErrorKind::UnknownChar);
    }

    #[test]
    fn test_code_position_points_at_column() {
        let diags = DiagnosticBuilder::new();
        let source = "var x = 1;\nvar y = $;";
        let text = diags.code_position(source, Span::new(19, 20, 2, 9));
        assert_eq!(text, "2 | var y = $;\n  |         ^");
    }

    #[test]
    fn test_render_uses_prefix_and_code() {
        let mut diags = DiagnosticBuilder::with_prefix("test.vi");
        diags.error(Error::UnknownChar { ch: '$', span: Span::new(0, 1, 1, 1) });
        let rendered = diags.render("$");
        assert_eq!(rendered.len(), 1);
        assert!(rendered[0].starts_with("test.vi: error[E0001]: Unknown character: '$' at 1:1"));
    }
}
