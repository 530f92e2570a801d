//! Frontend module - Lexer, Parser, Semantic Analysis

pub mod token;
pub mod lexer;
pub mod ast;
pub mod parser;
pub mod semantic;

use crate::config::Config;
use crate::utils::DiagnosticBuilder;

use self::ast::Module;
use self::lexer::Lexer;
use self::parser::Parser;

/// Lex, parse and verify `source`
///
/// Diagnostics from every stage land in `diags`. The module is returned even
/// when verification fails so callers can inspect what was understood.
pub fn check_source(source: &str, config: &Config, diags: &mut DiagnosticBuilder) -> (bool, Module) {
    log::debug!("parsing {} byte(s) of source", source.len());
    let module = Parser::new(Lexer::new(source), config, diags).parse_module();
    let parsed = !diags.has_errors();

    log::debug!("running semantic analysis");
    let (verified, module) = semantic::verify(module, diags);
    (parsed && verified, module)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_source_reports_every_stage() {
        let mut diags = DiagnosticBuilder::new();
        let (ok, module) = check_source("var a = 1 $;\nvar b: int = a;", &Config::new(), &mut diags);
        assert!(!ok);
        assert!(diags.has_errors());
        assert_eq!(module.main().map(|m| m.body.len()), Some(2));
    }

    #[test]
    fn test_check_source_accepts_valid_program() {
        let mut diags = DiagnosticBuilder::new();
        let (ok, module) = check_source(
            "func sq(x: int) -> int { return x * x; }\nvar n = sq(4);",
            &Config::new(),
            &mut diags,
        );
        assert!(ok, "{:?}", diags.diagnostics());
        assert_eq!(module.functions.len(), 2);
    }
}
