//! Event errors

use kula_core::ErrorKind;
use thiserror::Error;

/// Errors raised by the event system
#[derive(Debug, Error)]
pub enum EventError {
    /// The bus behind a handle or event has been dropped
    #[error("Event bus is not initialized")]
    NotInitialized,

    /// A subscriber failed while being notified
    #[error("Subscriber failed: {0}")]
    Subscriber(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl EventError {
    /// Wrap a subscriber failure
    pub fn subscriber(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        EventError::Subscriber(Box::new(err))
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            EventError::NotInitialized => ErrorKind::Logic,
            EventError::Subscriber(_) => ErrorKind::Runtime,
        }
    }
}

/// Result type alias
pub type Result<T> = core::result::Result<T, EventError>;
