//! Compile-time diagnostics.
//!
//! Errors accumulate token-keyed; positions are rendered lazily against the
//! source. Notes attach follow-up context to the previous error, the way
//! redefinitions point back at the first definition.

use crate::token::Token;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Severity {
    Error,
    Note,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub lexeme: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.severity {
            Severity::Error => "error",
            Severity::Note => "note",
        };
        if self.lexeme.is_empty() {
            write!(f, "{}:{}: {}: {}", self.line, self.column, tag, self.message)
        } else {
            write!(f, "{}:{}: {}: {} ('{}')", self.line, self.column, tag, self.message, self.lexeme)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Report {
    diagnostics: Vec<Diagnostic>,
}

impl Report {
    pub fn new() -> Report {
        Report::default()
    }

    pub fn error(&mut self, token: Token, message: &str, source: &str) {
        self.push(Severity::Error, token, message, source);
    }

    pub fn note(&mut self, token: Token, message: &str, source: &str) {
        self.push(Severity::Note, token, message, source);
    }

    fn push(&mut self, severity: Severity, token: Token, message: &str, source: &str) {
        let (line, column) = token.position(source);
        self.diagnostics.push(Diagnostic {
            severity,
            message: message.to_string(),
            line,
            column,
            lexeme: token.lexeme(source).to_string(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// True when any diagnostic message contains `needle`; test helper for
    /// asserting on specific failures.
    pub fn mentions(&self, needle: &str) -> bool {
        self.diagnostics.iter().any(|d| d.message.contains(needle))
    }
}

impl std::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for diagnostic in &self.diagnostics {
            writeln!(f, "{}", diagnostic)?;
        }
        Ok(())
    }
}
