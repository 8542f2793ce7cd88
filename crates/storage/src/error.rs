//! Backend error types and result alias.
//!
//! Every [`TokenBackend`](crate::TokenBackend) implementation maps its internal
//! failures onto [`BackendError`]. A backend reporting that a secret is wrong is
//! *not* an error: that outcome is `Ok(false)`.
//!
//! # Error Types
//!
//! - [`BackendError::Connection`] - The authoritative store could not be reached
//! - [`BackendError::Timeout`] - The backend did not answer in time
//! - [`BackendError::Internal`] - Malformed data or an internal fault
//! - [`BackendError::Unsupported`] - The backend does not implement an operation
//! - [`BackendError::Conflict`] - A token with the same qualified name already exists
//!
//! # Example
//!
//! ```
//! use svcauth_storage::{BackendError, BackendResult};
//!
//! fn lookup(reachable: bool) -> BackendResult<bool> {
//!     if reachable { Ok(true) } else { Err(BackendError::connection("token store offline")) }
//! }
//!
//! assert!(lookup(false).is_err());
//! ```

use std::sync::Arc;

use thiserror::Error;

/// A shareable boxed error used for source chain tracking.
///
/// `Arc` rather than `Box` so that [`BackendError`] stays `Clone`: a single
/// backend failure is handed to every caller waiting on the same validation.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors raised by an authoritative token backend.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`. Downstream match expressions must
/// include a wildcard arm (`_ =>`).
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum BackendError {
    /// Connection or network error.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
        /// The underlying error that caused this connection failure.
        #[source]
        source: Option<BoxError>,
    },

    /// The backend did not answer within its time limit.
    #[error("Operation timeout")]
    Timeout,

    /// Internal backend error (malformed data, unexpected state).
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
        /// The underlying error that caused this internal failure.
        #[source]
        source: Option<BoxError>,
    },

    /// The backend does not support the requested operation.
    #[error("Unsupported operation: {operation}")]
    Unsupported {
        /// Name of the unsupported operation.
        operation: String,
    },

    /// A token with the same qualified name already exists.
    #[error("Token already exists: {key}")]
    Conflict {
        /// The conflicting qualified name.
        key: String,
    },
}

impl BackendError {
    /// Creates a new `Connection` error with the given message.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into(), source: None }
    }

    /// Creates a new `Connection` error with a message and source error.
    #[must_use]
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout() -> Self {
        Self::Timeout
    }

    /// Creates a new `Internal` error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Creates a new `Internal` error with a message and source error.
    #[must_use]
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Unsupported` error for the named operation.
    #[must_use]
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported { operation: operation.into() }
    }

    /// Creates a new `Conflict` error for the given qualified name.
    #[must_use]
    pub fn conflict(key: impl Into<String>) -> Self {
        Self::Conflict { key: key.into() }
    }

    /// Returns `true` if retrying the same call later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            BackendError::connection("refused").to_string(),
            "Connection error: refused"
        );
        assert_eq!(BackendError::timeout().to_string(), "Operation timeout");
        assert_eq!(BackendError::internal("bad hash").to_string(), "Internal error: bad hash");
        assert_eq!(
            BackendError::unsupported("find_tokens_for").to_string(),
            "Unsupported operation: find_tokens_for"
        );
        assert_eq!(
            BackendError::conflict("ns/svc/t1").to_string(),
            "Token already exists: ns/svc/t1"
        );
    }

    #[test]
    fn test_source_chain_survives_clone() {
        let err = BackendError::connection_with_source("store offline", BackendError::Timeout);
        let cloned = err.clone();

        let source = cloned.source().expect("source exists");
        assert_eq!(source.to_string(), "Operation timeout");
    }

    #[test]
    fn test_is_transient() {
        assert!(BackendError::connection("x").is_transient());
        assert!(BackendError::timeout().is_transient());
        assert!(!BackendError::internal("x").is_transient());
        assert!(!BackendError::unsupported("x").is_transient());
    }
}
