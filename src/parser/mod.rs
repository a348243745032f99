//! Textual IR parser
//!
//! Accepts the LLVM-like syntax the printer emits: `declare`/`define`,
//! labelled blocks, typed operands, vector constants and the instruction
//! set of [`crate::ir::InstKind`]. Other instructions, globals and named
//! types are kept as written. Flags (`nsw`, `nuw`, `exact`, `tail`,
//! fast-math), attributes and metadata are accepted and dropped.

pub mod lexer;
pub mod parser;

pub use parser::parse;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("line {line}: {message}")]
    Lexer { line: usize, message: String },

    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("line {line}: invalid type: {message}")]
    InvalidType { line: usize, message: String },

    #[error("line {line}: use of undefined value '%{name}'")]
    UndefinedValue { line: usize, name: String },

    #[error("line {line}: redefinition of '%{name}'")]
    Redefinition { line: usize, name: String },
}

impl ParseError {
    /// Source line of the error, if known.
    pub fn line(&self) -> Option<usize> {
        match self {
            ParseError::Lexer { line, .. }
            | ParseError::Syntax { line, .. }
            | ParseError::InvalidType { line, .. }
            | ParseError::UndefinedValue { line, .. }
            | ParseError::Redefinition { line, .. } => Some(*line),
            ParseError::UnexpectedEof => None,
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;
