//! Centralised error hierarchy for the **loxide** interpreter.
//!
//! All subsystems (scanner, parser, runtime, CLI) convert their internal
//! failure modes into one of the variants defined here.  This enables a
//! uniform `Result<T>` alias throughout the crate and ergonomic
//! inter‑operation with `anyhow`, while still preserving rich diagnostic
//! detail.
//!
//! The module **does not** print diagnostics itself; the `Display` impls
//! produce the exact user-facing forms, and the driver decides where they
//! go and which exit code they map to.

use std::io;
use thiserror::Error;

use log::info;

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical error: a byte no token can start with.
    #[error("[line {line}] Error: Unexpected character: {ch}")]
    UnexpectedCharacter { ch: char, line: usize },

    /// Lexical error: the input ended inside a string literal.  `line` is
    /// the line of the opening quote.
    #[error("[line {line}] Error: Unterminated string.")]
    UnterminatedString { line: usize },

    /// Syntactic error: the parser saw a token it could not accept here.
    #[error("[line {line}] Error at '{lexeme}': {message}")]
    UnexpectedToken {
        lexeme: String,
        message: String,

        /// 1‑based line where the error occurred.
        line: usize,
    },

    /// Syntactic error: the token stream ended in the middle of a
    /// production.  Distinct from the benign end-of-stream sentinel, which
    /// the parser's pull methods express as `None`.
    #[error("[line {line}] Error: Unexpected end of file.")]
    UnexpectedEof { line: usize },

    /// Syntactic error: a `(` group was never closed.
    #[error("[line {line}] Error: Unbalanced parentheses.")]
    UnbalancedParentheses { line: usize },

    /// Syntactic error: the left-hand side of `=` is not assignable.
    #[error("[line {line}] Error at '=': Invalid assignment target.")]
    InvalidAssignmentTarget { line: usize },

    /// Syntactic error: `class Foo < Foo`.
    #[error("[line {line}] Error at '{name}': A class can't inherit from itself.")]
    SelfInheritance { name: String, line: usize },

    /// Runtime evaluation error.
    #[error("{message}\n[line {line}]")]
    Runtime { message: String, line: usize },

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl LoxError {
    /// Helper constructor for the **parser**.
    pub fn unexpected_token<L, M>(line: usize, lexeme: L, msg: M) -> Self
    where
        L: Into<String>,
        M: Into<String>,
    {
        let lexeme: String = lexeme.into();
        let message: String = msg.into();

        info!(
            "Creating UnexpectedToken error: line={}, lexeme={}, msg={}",
            line, lexeme, message
        );

        LoxError::UnexpectedToken {
            lexeme,
            message,
            line,
        }
    }

    /// Helper constructor for the **evaluator**.
    pub fn runtime<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Runtime error: line={}, msg={}", line, message);

        LoxError::Runtime { message, line }
    }

    /// The process exit code this diagnostic maps to: 70 for runtime
    /// failures, 1 for I/O, 65 for anything lexical or syntactic.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoxError::Runtime { .. } => 70,
            LoxError::Io(_) => 1,
            _ => 65,
        }
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;
