//! Error taxonomy
//!
//! Every failure surfaces to the caller as an [`Error`] value. Tokenizer
//! failures carry the engine's code and position in a [`ParseError`];
//! structural failures found by the tree builder carry the offending names.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::core::tokenizer::ErrorCode;

/// Malformed markup reported by the tokenizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub description: String,
    pub code: u32,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    pub fn new(code: ErrorCode, line: usize, column: usize) -> Self {
        ParseError {
            description: code.description().to_string(),
            code: code.code(),
            line,
            column,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error [{}] at line {} column {}: {}",
            self.code, self.line, self.column, self.description
        )
    }
}

impl std::error::Error for ParseError {}

/// Errors produced while building or manipulating an element tree
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The tokenizer rejected the input
    #[error("{0}")]
    Tokenizer(ParseError),

    /// An end tag did not match the innermost open element
    #[error("end tag mismatch (expected {expected}, got {found})")]
    TagMismatch { expected: String, found: String },

    /// An end tag arrived while no element was open
    #[error("end tag </{tag}> without open element")]
    UnexpectedEndTag { tag: String },

    /// Input ended while elements were still open
    #[error("missing end tags for {}", open.join(", "))]
    UnclosedElements { open: Vec<String> },

    /// Input ended before any element was opened
    #[error("missing top level element")]
    EmptyDocument,

    /// An entity reference had no entry in the entity table
    #[error("undefined entity &{name}; at line {line} column {column}")]
    UndefinedEntity {
        name: String,
        line: usize,
        column: usize,
    },

    /// A second top-level element was opened after the root closed
    #[error("junk after document element: <{tag}>")]
    MultipleRoots { tag: String },

    #[error("child index {index} out of range for element with {len} children")]
    IndexOutOfRange { index: usize, len: usize },

    /// Reading the input failed
    #[error("I/O error: {0}")]
    Io(#[source] Arc<std::io::Error>),
}

impl Error {
    /// Expat-compatible error code for this failure
    ///
    /// Returns `None` for errors that do not originate from parsing.
    pub fn code(&self) -> Option<u32> {
        match self {
            Error::Tokenizer(e) => Some(e.code),
            Error::TagMismatch { .. } => Some(ErrorCode::TagMismatch.code()),
            Error::UnexpectedEndTag { .. } => Some(ErrorCode::Syntax.code()),
            Error::UnclosedElements { .. } | Error::EmptyDocument => {
                Some(ErrorCode::NoElements.code())
            }
            Error::UndefinedEntity { .. } => Some(ErrorCode::UndefinedEntity.code()),
            Error::MultipleRoots { .. } => Some(ErrorCode::JunkAfterDocElement.code()),
            Error::IndexOutOfRange { .. } | Error::Io(_) => None,
        }
    }

    /// Line and column the error was detected at, when known
    pub fn position(&self) -> Option<(usize, usize)> {
        match self {
            Error::Tokenizer(e) => Some((e.line, e.column)),
            Error::UndefinedEntity { line, column, .. } => Some((*line, *column)),
            _ => None,
        }
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::Tokenizer(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(Arc::new(e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
