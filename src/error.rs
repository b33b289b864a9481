//! Centralised error hierarchy for the interpreter.
//!
//! All subsystems (scanner, parser, resolver, runtime, CLI) convert their
//! internal failure modes into one of the variants defined here.  This enables a
//! uniform `Result<T>` alias throughout the crate and ergonomic inter‑operation
//! with `anyhow`, while still preserving rich diagnostic detail.
//!
//! The module **does not** print diagnostics itself; the `Display` impls are
//! the report formats written to the error sink by the driver.

use std::io;
use thiserror::Error;

use log::debug;

use crate::token::Token;

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error with source line information.
    #[error("[Line {line}] Error: {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        /// 1‑based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error.  `location` is ` at end` or ` at '<lexeme>'`.
    #[error("[Line {line}] Error{location}: {message}")]
    Parse {
        message: String,
        line: usize,
        location: String,
    },

    /// Static‑analysis failure found by the resolver.
    #[error("[Line {line}] Error{location}: {message}")]
    Resolve {
        message: String,
        line: usize,
        location: String,
    },

    /// Runtime evaluation error.  Aborts the current run.
    #[error("[Line {line}] {message}")]
    Runtime { message: String, line: usize },

    /// The call depth limit was hit before the host stack ran out.
    #[error("[Line {line}] Stack overflow")]
    StackOverflow { line: usize },

    /// Wrapper around `std::io::Error`.  Enables `?` on I/O ops.
    #[error("I/O error: {0}")]
    Io(String),

    /// UTF‑8 decoding failure when ingesting external text.
    #[error(transparent)]
    Utf8(#[from] std::str::Utf8Error),
}

impl From<io::Error> for LoxError {
    fn from(err: io::Error) -> Self {
        LoxError::Io(err.to_string())
    }
}

impl LoxError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating Lex error: line={}, msg={}", line, message);

        LoxError::Lex { message, line }
    }

    /// Helper constructor for the **parser**; the location is taken from the
    /// offending token.
    pub fn parse<S: Into<String>>(token: &Token<'_>, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating Parse error: line={}, msg={}", token.line, message);

        LoxError::Parse {
            message,
            line: token.line,
            location: token.location(),
        }
    }

    /// Helper constructor for the **resolver**.  `lexeme` is the name or
    /// keyword the error is reported at.
    pub fn resolve<S: Into<String>>(line: usize, lexeme: &str, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating Resolve error: line={}, msg={}", line, message);

        LoxError::Resolve {
            message,
            line,
            location: format!(" at '{}'", lexeme),
        }
    }

    /// Helper constructor for the **interpreter**.
    pub fn runtime<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating Runtime error: line={}, msg={}", line, message);

        LoxError::Runtime { message, line }
    }

    /// Errors found before execution starts (scan, parse, resolve).
    pub fn is_static(&self) -> bool {
        matches!(
            self,
            LoxError::Lex { .. } | LoxError::Parse { .. } | LoxError::Resolve { .. }
        )
    }

    /// Process exit code used by the command‑line driver.
    pub fn exit_code(&self) -> i32 {
        if self.is_static() {
            65
        } else {
            70
        }
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    #[test]
    fn parse_error_reports_lexeme_location() {
        let token = Token::new(TokenType::EQUAL, "=", 2);
        let err = LoxError::parse(&token, "Invalid assignment target");

        assert_eq!(
            err.to_string(),
            "[Line 2] Error at '=': Invalid assignment target"
        );
    }

    #[test]
    fn parse_error_at_end_of_input() {
        let token = Token::new(TokenType::EOF, "", 7);
        let err = LoxError::parse(&token, "Expect expression");

        assert_eq!(err.to_string(), "[Line 7] Error at end: Expect expression");
    }

    #[test]
    fn runtime_error_has_no_error_prefix() {
        let err = LoxError::runtime(1, "Undefined variable 'x'");

        assert_eq!(err.to_string(), "[Line 1] Undefined variable 'x'");
        assert_eq!(err.exit_code(), 70);
    }
}
