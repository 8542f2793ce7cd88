//! Authentication error types.
//!
//! A wrong secret is never an error: `authenticate` resolves to `Ok(false)`.
//! The variants here describe failures to reach a verdict at all.

use svcauth_storage::{BackendError, HashingError};
use thiserror::Error;

/// Errors surfaced by the caching token store.
///
/// `Clone` because one failed validation is delivered to every caller that
/// was coalesced onto it.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`. Downstream match expressions must
/// include a wildcard arm (`_ =>`).
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// The authoritative backend failed; relayed verbatim.
    #[error("Token backend error: {0}")]
    Backend(
        /// The backend's own error.
        #[source]
        BackendError,
    ),

    /// A verifier could not be built for a secret the backend accepted.
    #[error("Verifier error: {0}")]
    Hashing(
        /// The hashing failure.
        #[source]
        HashingError,
    ),

    /// The shared validation ended without publishing a verdict.
    #[error("Token validation abandoned")]
    ValidationAbandoned,
}

impl From<BackendError> for AuthError {
    fn from(err: BackendError) -> Self {
        AuthError::Backend(err)
    }
}

impl From<HashingError> for AuthError {
    fn from(err: HashingError) -> Self {
        AuthError::Hashing(err)
    }
}

impl AuthError {
    /// Returns the backend error if this failure came from the backend.
    #[must_use]
    pub fn as_backend_error(&self) -> Option<&BackendError> {
        match self {
            AuthError::Backend(err) => Some(err),
            _ => None,
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A numeric field is below its minimum.
    #[error("{field} must be at least {min}, got {value}")]
    BelowMinimum {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: String,
        /// The minimum accepted value.
        min: String,
    },
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::from(BackendError::timeout());
        assert_eq!(err.to_string(), "Token backend error: Operation timeout");

        let err = AuthError::ValidationAbandoned;
        assert_eq!(err.to_string(), "Token validation abandoned");

        let err = ConfigError::BelowMinimum {
            field: "max_tokens",
            value: "0".into(),
            min: "1".into(),
        };
        assert_eq!(err.to_string(), "max_tokens must be at least 1, got 0");
    }

    #[test]
    fn test_backend_error_preserves_source_chain() {
        let backend_err =
            BackendError::connection_with_source("token store offline", BackendError::Timeout);
        let auth_err = AuthError::from(backend_err);

        let level_1 = auth_err.source().expect("level 1 source");
        assert_eq!(level_1.to_string(), "Connection error: token store offline");

        let level_2 = level_1.source().expect("level 2 source");
        assert_eq!(level_2.to_string(), "Operation timeout");
    }

    #[test]
    fn test_as_backend_error() {
        let err = AuthError::from(BackendError::internal("boom"));
        assert!(matches!(err.as_backend_error(), Some(BackendError::Internal { .. })));
        assert!(AuthError::ValidationAbandoned.as_backend_error().is_none());
    }
}
