//! Parse errors

use kula_core::ErrorKind;
use thiserror::Error;

use crate::expression::ExpressionError;

/// Errors raised while deserializing JSON into a wrapper
#[derive(Debug, Error)]
pub enum ParseError {
    /// Failure reported by the data model
    #[error(transparent)]
    Data(#[from] kula_core::Error),

    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input is empty")]
    Empty,

    #[error("Root JSON value is not an object")]
    RootNotObject,

    #[error("No helper can parse `{key}`")]
    NoHelper { key: String },

    #[error("Object `{0}` mixes keyworded and plain members")]
    MixedKeywords(String),

    #[error("Key `{0}` has too many annotation tokens")]
    TooManyTokens(String),

    #[error("Parse depth ended at {found}, expected {expected}")]
    DepthImbalance { expected: usize, found: usize },

    #[error("Nesting deeper than {0} levels")]
    TooDeep(usize),

    #[error("Expression error: {0}")]
    Expression(#[from] ExpressionError),
}

impl ParseError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ParseError::Data(err) => err.kind(),
            ParseError::Json(_)
            | ParseError::Empty
            | ParseError::TooManyTokens(_)
            | ParseError::Expression(_) => ErrorKind::InvalidArgument,
            ParseError::Io(_)
            | ParseError::RootNotObject
            | ParseError::NoHelper { .. }
            | ParseError::TooDeep(_) => ErrorKind::Runtime,
            ParseError::MixedKeywords(_) | ParseError::DepthImbalance { .. } => ErrorKind::Logic,
        }
    }
}

/// Result type alias
pub type Result<T> = core::result::Result<T, ParseError>;
