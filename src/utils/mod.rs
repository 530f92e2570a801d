//! Utility module

mod span;
mod error;
pub mod diagnostics;

pub use span::Span;
pub use error::{Error, Result};
pub use diagnostics::{Diagnostic, DiagnosticBuilder, ErrorKind, Severity};
