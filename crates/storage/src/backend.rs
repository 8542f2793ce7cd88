//! Authoritative token backend contract.
//!
//! This module provides the [`TokenBackend`] trait that the caching layer
//! delegates to, plus [`MemoryTokenBackend`], an in-memory hashed-credential
//! store used for tests and local development.
//!
//! # Contract
//!
//! - `validate` answers whether the presented secret is *currently* correct.
//!   A wrong secret is `Ok(false)`, not an error.
//! - `find_tokens_for` enumerates the tokens of one account.
//! - Implementations may be called concurrently for different tokens.
//!
//! # Usage
//!
//! ```no_run
//! use svcauth_storage::{MemoryTokenBackend, ServiceAccountId, ServiceAccountToken, TokenBackend};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = MemoryTokenBackend::new();
//! let token = ServiceAccountToken::new_token(ServiceAccountId::new("elastic", "fleet-server")?, "t1")?;
//! backend.create_token(&token)?;
//!
//! assert!(backend.validate(&token).await?);
//! # Ok(())
//! # }
//! ```

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{
    error::{BackendError, BackendResult},
    token::{ServiceAccountId, ServiceAccountToken, TokenInfo, TokenSource},
    verifier::{HashAlgorithm, Verifier},
};

/// Authoritative validation and listing of service account tokens.
///
/// Injected into the caching layer at construction; the cache never assumes
/// anything about how secrets are stored behind it.
#[async_trait]
pub trait TokenBackend: Send + Sync {
    /// Reports whether `token`'s secret is currently correct.
    ///
    /// # Returns
    ///
    /// - `Ok(true)` if the secret is valid
    /// - `Ok(false)` if the token is unknown or the secret is wrong
    /// - `Err(...)` if the backend itself failed
    async fn validate(&self, token: &ServiceAccountToken) -> BackendResult<bool>;

    /// Lists the tokens issued to `account_id`.
    ///
    /// Never served from a cache.
    async fn find_tokens_for(&self, account_id: &ServiceAccountId) -> BackendResult<Vec<TokenInfo>>;
}

/// In-memory [`TokenBackend`] that stores only verifiers.
///
/// Tokens are indexed by qualified name in a sorted map so that listing one
/// account is a range scan over its prefix.
#[derive(Clone)]
pub struct MemoryTokenBackend {
    tokens: Arc<RwLock<BTreeMap<String, Verifier>>>,
    algorithm: HashAlgorithm,
    source: TokenSource,
}

impl Default for MemoryTokenBackend {
    fn default() -> Self {
        Self::with_algorithm(HashAlgorithm::default())
    }
}

impl MemoryTokenBackend {
    /// Creates an empty store hashing with [`HashAlgorithm::Ssha256`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store hashing with `algorithm`.
    #[must_use]
    pub fn with_algorithm(algorithm: HashAlgorithm) -> Self {
        Self {
            tokens: Arc::new(RwLock::new(BTreeMap::new())),
            algorithm,
            source: TokenSource::File,
        }
    }

    /// Sets the source reported by [`find_tokens_for`](TokenBackend::find_tokens_for).
    #[must_use]
    pub fn with_source(mut self, source: TokenSource) -> Self {
        self.source = source;
        self
    }

    /// Stores the hashed secret of `token`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Conflict`] if the qualified name is taken, or
    /// [`BackendError::Internal`] if hashing fails.
    #[tracing::instrument(skip(self, token), fields(token = %token.qualified_name()))]
    pub fn create_token(&self, token: &ServiceAccountToken) -> BackendResult<()> {
        let verifier = Verifier::build(self.algorithm, token.secret())
            .map_err(|e| BackendError::internal_with_source("failed to hash token secret", e))?;

        let mut tokens = self.tokens.write();
        if tokens.contains_key(token.qualified_name()) {
            return Err(BackendError::conflict(token.qualified_name()));
        }
        tokens.insert(token.qualified_name().to_owned(), verifier);
        Ok(())
    }

    /// Removes the token with `qualified_name`. Returns whether it existed.
    #[tracing::instrument(skip(self))]
    pub fn delete_token(&self, qualified_name: &str) -> bool {
        self.tokens.write().remove(qualified_name).is_some()
    }

    /// Returns the number of stored tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.read().len()
    }

    /// Returns `true` if no tokens are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.read().is_empty()
    }
}

#[async_trait]
impl TokenBackend for MemoryTokenBackend {
    #[tracing::instrument(skip(self, token), fields(token = %token.qualified_name()))]
    async fn validate(&self, token: &ServiceAccountToken) -> BackendResult<bool> {
        let tokens = self.tokens.read();
        Ok(tokens.get(token.qualified_name()).is_some_and(|v| v.matches(token.secret())))
    }

    #[tracing::instrument(skip(self), fields(account = %account_id))]
    async fn find_tokens_for(&self, account_id: &ServiceAccountId) -> BackendResult<Vec<TokenInfo>> {
        let prefix = account_id.token_prefix();
        let tokens = self.tokens.read();
        let found = tokens
            .range(prefix.clone()..)
            .take_while(|(name, _)| name.starts_with(&prefix))
            .map(|(name, _)| TokenInfo::new(&name[prefix.len()..], self.source))
            .collect();
        Ok(found)
    }
}
