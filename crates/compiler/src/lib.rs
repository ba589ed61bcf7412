//! Matiria compiler
//!
//! Compiles Matiria source text into a [`Package`] of bytecode callables:
//! lexer, Pratt parser (with an interning type registry), two-pass semantic
//! validator, and bytecode emitter. The package is executed by the
//! `matiria-runtime` engine.
//!
//! ```rust
//! use matiria_compiler::compile;
//!
//! let package = compile("fn main() -> Int { return 2 + 3; }").unwrap();
//! assert!(package.get("main").is_some());
//! ```

pub mod ast;
pub mod emitter;
pub mod lexer;
pub mod parser;
pub mod report;
pub mod scope;
pub mod token;
pub mod types;
pub mod validator;

pub use lexer::Lexer;
pub use parser::Parser;
pub use report::Report;
pub use token::{Token, TokenKind};
pub use types::{Type, TypeId, TypeInterner};
pub use validator::Validator;

use matiria_core::Package;

/// A failed compilation. The variant tells the host which stage gave up;
/// parser errors suppress validation, validation errors suppress emission.
#[derive(Debug)]
pub enum CompileError {
    Parser(Report),
    Type(Report),
}

impl CompileError {
    pub fn report(&self) -> &Report {
        match self {
            CompileError::Parser(report) | CompileError::Type(report) => report,
        }
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::Parser(report) => write!(f, "syntax errors:\n{}", report),
            CompileError::Type(report) => write!(f, "type errors:\n{}", report),
        }
    }
}

impl std::error::Error for CompileError {}

/// Compile a source buffer into a package. Diagnostics accumulate through
/// each stage; the pipeline stops at the first stage that fails.
pub fn compile(source: &str) -> Result<Package, CompileError> {
    let outcome = Parser::new(source).parse();
    if outcome.had_error {
        return Err(CompileError::Parser(outcome.report));
    }

    let mut ast = outcome.ast;
    let mut types = outcome.types;

    let mut validator = Validator::new(source, &mut types);
    let ok = validator.validate(&mut ast);
    let report = validator.into_report();
    if !ok {
        return Err(CompileError::Type(report));
    }

    Ok(emitter::emit(&ast, &types, source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_minimal_program() {
        let package = compile("fn main() -> Int { return 1; }").expect("compiles");
        assert_eq!(package.count(), 1);
        assert!(package.get("main").is_some());
    }

    #[test]
    fn syntax_errors_stop_before_validation() {
        let err = compile("fn main( { }").unwrap_err();
        assert!(matches!(err, CompileError::Parser(_)));
        assert!(!err.report().is_empty());
    }

    #[test]
    fn type_errors_stop_before_emission() {
        let err = compile("fn main() -> Int { return 'text'; }").unwrap_err();
        assert!(matches!(err, CompileError::Type(_)));
        assert!(err.report().mentions("Incompatible return type."));
    }
}
