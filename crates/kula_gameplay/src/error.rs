//! Gameplay errors

use kula_core::ErrorKind;
use kula_event::EventError;
use kula_parse::{ExpressionError, ParseError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GameplayError {
    #[error(transparent)]
    Data(#[from] kula_core::Error),

    #[error("Level failed to load: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Event(#[from] EventError),

    #[error("Expression failed: {0}")]
    Expression(#[from] ExpressionError),

    /// A reflected scope in an action list has no update function
    #[error("No update registered for class {0}")]
    NoUpdateHandler(String),

    /// An increment names a key that no enclosing scope holds
    #[error("Target `{0}` not found")]
    UnknownTarget(String),

    #[error("Scope {0} is not a {1}")]
    WrongClass(String, &'static str),
}

impl GameplayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameplayError::Data(err) => err.kind(),
            GameplayError::Parse(err) => err.kind(),
            GameplayError::Event(err) => err.kind(),
            GameplayError::Expression(_) | GameplayError::UnknownTarget(_) => ErrorKind::Runtime,
            GameplayError::NoUpdateHandler(_) | GameplayError::WrongClass(..) => ErrorKind::Logic,
        }
    }
}

pub type Result<T> = core::result::Result<T, GameplayError>;
