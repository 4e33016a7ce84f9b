//! Farr Compiler Frontend
//!
//! Turns Farr source text (`.farr`) into a [`compiler::ast::Module`]: lexing
//! first, then recursive-descent parsing. There is no lowering beyond the
//! AST — the runtime crate walks it directly.

pub mod compiler;

use compiler::ast::Module;
use compiler::lexer::{LexError, Lexer};
use compiler::parser::{self, ParseError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Lexes then parses `source`, producing the module AST consumed by the
/// runtime's evaluator.
pub fn compile(source: &str) -> Result<Module, CompileError> {
    let tokens = Lexer::new(source).tokenize()?;
    let module = parser::parse(tokens)?;
    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_small_program() {
        let module = compile("let x = + 1 2; println(x);").unwrap();
        assert_eq!(module.body.len(), 2);
    }

    #[test]
    fn reports_lex_errors() {
        let err = compile("let x = `;").unwrap_err();
        assert!(matches!(err, CompileError::Lex(_)));
    }

    #[test]
    fn reports_parse_errors() {
        let err = compile("fn () = { }").unwrap_err();
        assert!(matches!(err, CompileError::Parse(_)));
    }
}
