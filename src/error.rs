//! Error types for the memoization engine
//!
//! Provides unified error handling using thiserror.

use std::fmt;

use thiserror::Error;

// == Memo Error Enum ==
/// Errors raised by the engine itself.
///
/// Failures of the wrapped operation are never converted into this type;
/// they travel through [`InvokeError::Operation`] untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoError {
    /// Argument tuple or result could not be encoded/decoded
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Durable backend unreachable or misconfigured
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A statement against the durable backend failed
    #[error("Store error: {0}")]
    Store(String),
}

impl From<rusqlite::Error> for MemoError {
    fn from(err: rusqlite::Error) -> Self {
        MemoError::Store(err.to_string())
    }
}

// == Invoke Error ==
/// Outcome of a failed memoized call.
#[derive(Debug)]
pub enum InvokeError<E> {
    /// The wrapped operation failed; propagated verbatim and never cached
    Operation(E),

    /// The engine failed before or after running the operation
    Memo(MemoError),
}

impl<E> InvokeError<E> {
    /// Returns the wrapped operation's error, if that is what failed.
    pub fn into_operation(self) -> Option<E> {
        match self {
            InvokeError::Operation(err) => Some(err),
            InvokeError::Memo(_) => None,
        }
    }
}

impl<E> From<MemoError> for InvokeError<E> {
    fn from(err: MemoError) -> Self {
        InvokeError::Memo(err)
    }
}

impl<E: fmt::Display> fmt::Display for InvokeError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvokeError::Operation(err) => err.fmt(f),
            InvokeError::Memo(err) => err.fmt(f),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for InvokeError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InvokeError::Operation(err) => std::error::Error::source(err),
            InvokeError::Memo(err) => std::error::Error::source(err),
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for engine operations.
pub type Result<T> = std::result::Result<T, MemoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoke_error_operation_is_verbatim() {
        let err: InvokeError<String> = InvokeError::Operation("boom".to_string());
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.into_operation(), Some("boom".to_string()));
    }

    #[test]
    fn test_invoke_error_from_memo_error() {
        let err: InvokeError<String> = MemoError::Encoding("bad".to_string()).into();
        assert_eq!(err.to_string(), "Encoding error: bad");
        assert!(err.into_operation().is_none());
    }
}
