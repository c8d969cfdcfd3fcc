use thiserror::Error;

use crate::lexer::TokenKind;

/// The lexer met a character no token pattern accepts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("lex error at byte {position}: unexpected character {found:?}")]
pub struct LexError {
    pub position: usize,
    pub found: char,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("expected {expected}, found {found} at byte {position}")]
    Expected {
        expected: TokenKind,
        found: TokenKind,
        position: usize,
    },
    #[error("unexpected {found} at byte {position}, expected an expression")]
    UnexpectedToken { found: TokenKind, position: usize },
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("integer literal {0} does not fit in 32 bits")]
    IntegerOutOfRange(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodegenError {
    #[error("undefined variable {0}")]
    UndefinedVariable(String),
    #[error("undefined function {0}")]
    UndefinedFunction(String),
    #[error("{0} is not an array")]
    NotAnArray(String),
    #[error("expected {expected} value, found {found}")]
    UnsupportedValue {
        expected: &'static str,
        found: &'static str,
    },
    #[error("function {name} takes {expected} arguments but {found} were supplied")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("function {0} is already defined")]
    DuplicateFunction(String),
}

/// Umbrella error for the whole pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("codegen error: {0}")]
    Codegen(#[from] CodegenError),
}
