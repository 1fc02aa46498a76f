//! Error types for the data model
//!
//! Every failure in the engine falls into one of four classes (see
//! [`ErrorKind`]). Callers that need to decide whether a failure is a data
//! problem or a programming error match on [`Error::kind`].

use thiserror::Error;

/// Broad classification of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller supplied something unusable (empty key, bad text, ...)
    InvalidArgument,
    /// An index was outside the valid element range
    OutOfRange,
    /// Input was well-formed but could not be processed
    Runtime,
    /// An invariant was broken; indicates a bug in the calling code
    Logic,
}

/// The core error type
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Generic invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Element index outside the datum
    #[error("Index {index} out of range (size {size})")]
    OutOfRange { index: usize, size: usize },

    /// Operation on a datum of the wrong type
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// Write through read-only external storage
    #[error("Datum is read-only")]
    ReadOnly,

    /// Storage cannot be changed in this mode
    #[error("Invalid storage operation: {0}")]
    InvalidStorage(String),

    /// Text could not be converted to a datum element
    #[error("Cannot parse `{text}` as {target}")]
    Conversion { text: String, target: String },

    /// Attaching a scope would create a cycle
    #[error("Attaching scope {child} under {target} would create a cycle")]
    CycleDetected { child: String, target: String },

    /// A scope id no longer refers to a live scope
    #[error("Scope {0} does not exist")]
    StaleScope(String),

    /// Key lookup failed
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Auxiliary attribute collides with a prescribed one
    #[error("`{0}` is a prescribed attribute")]
    PrescribedKey(String),

    /// No signatures registered for a reflected type
    #[error("No signatures registered for type {0}")]
    SignaturesNotFound(String),

    /// Parent type used for registration has no signatures
    #[error("Parent type {0} has no registered signatures")]
    MissingParent(String),

    /// Class name unknown to the registry
    #[error("Unknown class: {0}")]
    UnknownClass(String),

    /// Reflected field does not match its signature
    #[error("Signature mismatch for `{key}`: {reason}")]
    SignatureMismatch { key: String, reason: String },
}

impl Error {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) | Error::Conversion { .. } | Error::UnknownClass(_) => {
                ErrorKind::InvalidArgument
            }
            Error::OutOfRange { .. } => ErrorKind::OutOfRange,
            Error::KeyNotFound(_) | Error::ReadOnly => ErrorKind::Runtime,
            Error::TypeMismatch { .. }
            | Error::InvalidStorage(_)
            | Error::CycleDetected { .. }
            | Error::StaleScope(_)
            | Error::PrescribedKey(_)
            | Error::SignaturesNotFound(_)
            | Error::MissingParent(_)
            | Error::SignatureMismatch { .. } => ErrorKind::Logic,
        }
    }

    /// Shorthand for a type mismatch
    pub fn type_mismatch(expected: impl ToString, found: impl ToString) -> Self {
        Error::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

/// Result type alias
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::OutOfRange { index: 3, size: 1 }.kind(), ErrorKind::OutOfRange);
        assert_eq!(Error::InvalidArgument("x".into()).kind(), ErrorKind::InvalidArgument);
        assert_eq!(
            Error::CycleDetected { child: "a".into(), target: "b".into() }.kind(),
            ErrorKind::Logic
        );
    }

    #[test]
    fn test_error_display() {
        let err = Error::type_mismatch("Integer", "String");
        assert_eq!(err.to_string(), "Type mismatch: expected Integer, found String");
    }
}
