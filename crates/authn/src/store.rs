//! Caching front end for a [`TokenBackend`].
//!
//! [`CachingTokenStore`] answers `authenticate` from a [`TokenCache`] when
//! caching is enabled and goes straight to the backend when it is not. Token
//! listing always bypasses the cache.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use svcauth_authn::{CachingTokenStore, TokenCacheConfig};
//! use svcauth_storage::{MemoryTokenBackend, ServiceAccountId, ServiceAccountToken};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = MemoryTokenBackend::new();
//! let account = ServiceAccountId::new("elastic", "fleet-server")?;
//! let token = ServiceAccountToken::new_token(account, "token1")?;
//! backend.create_token(&token)?;
//!
//! let store = CachingTokenStore::new(Arc::new(backend), TokenCacheConfig::default())?;
//! assert!(store.authenticate(&token).await?);
//! assert_eq!(store.cache().map(|c| c.metrics().misses), Some(1));
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use svcauth_storage::{ServiceAccountId, ServiceAccountToken, TokenBackend, TokenInfo};

use crate::{
    config::TokenCacheConfig,
    error::{AuthError, ConfigError, Result},
    token_cache::TokenCache,
};

/// Service account token store with an optional credential cache.
pub struct CachingTokenStore {
    backend: Arc<dyn TokenBackend>,
    cache: Option<TokenCache>,
}

impl std::fmt::Debug for CachingTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingTokenStore").field("cache", &self.cache).finish_non_exhaustive()
    }
}

impl CachingTokenStore {
    /// Creates a store in front of `backend`.
    ///
    /// A zero TTL in `config` disables caching; no cache is allocated and
    /// [`cache`](Self::cache) returns `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` fails validation.
    pub fn new(
        backend: Arc<dyn TokenBackend>,
        config: TokenCacheConfig,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let cache = config.is_enabled().then(|| TokenCache::new(&config));
        if cache.is_none() {
            tracing::info!("service account token cache disabled");
        }
        Ok(Self { backend, cache })
    }

    /// Returns the cache, or `None` when caching is disabled.
    #[must_use]
    pub fn cache(&self) -> Option<&TokenCache> {
        self.cache.as_ref()
    }

    /// Returns the authoritative backend.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn TokenBackend> {
        &self.backend
    }

    /// Checks whether `token`'s secret is currently valid.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Backend`] if the backend failed, or
    /// [`AuthError::Hashing`] if a verifier could not be built for an
    /// accepted secret. A wrong secret is `Ok(false)`.
    #[tracing::instrument(skip(self, token), fields(token = %token.qualified_name()))]
    pub async fn authenticate(&self, token: &ServiceAccountToken) -> Result<bool> {
        match &self.cache {
            Some(cache) => cache.authenticate(token, &self.backend).await,
            None => self.backend.validate(token).await.map_err(AuthError::from),
        }
    }

    /// Lists the tokens registered for `account_id`. Never cached.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Backend`] if the backend failed.
    #[tracing::instrument(skip(self), fields(account = %account_id))]
    pub async fn find_tokens_for(&self, account_id: &ServiceAccountId) -> Result<Vec<TokenInfo>> {
        Ok(self.backend.find_tokens_for(account_id).await?)
    }

    /// Removes cached entries by qualified name or account prefix.
    ///
    /// No-op when caching is disabled.
    pub async fn invalidate<S: AsRef<str> + std::fmt::Debug>(&self, keys: &[S]) {
        if let Some(cache) = &self.cache {
            cache.invalidate(keys).await;
        }
    }

    /// Removes every cached entry. No-op when caching is disabled.
    pub async fn invalidate_all(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all().await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;
    use svcauth_storage::{
        BackendError, TokenSource,
        testutil::{INVALID_SECRET, TestBackend, VALID_SECRET, make_account, make_token},
    };

    use super::*;

    fn store(backend: &TestBackend, ttl: Duration) -> CachingTokenStore {
        let config = TokenCacheConfig::builder().ttl(ttl).build().expect("config");
        CachingTokenStore::new(Arc::new(backend.clone()), config).expect("store")
    }

    #[rstest]
    #[case::enabled(Duration::from_secs(60), true)]
    #[case::disabled(Duration::ZERO, false)]
    fn test_cache_presence_follows_ttl(#[case] ttl: Duration, #[case] expect_cache: bool) {
        let store = store(&TestBackend::new(), ttl);
        assert_eq!(store.cache().is_some(), expect_cache);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config: TokenCacheConfig =
            serde_json::from_str(r#"{ "max_tokens": 0 }"#).expect("parse");
        let result = CachingTokenStore::new(Arc::new(TestBackend::new()), config);
        assert!(matches!(result, Err(ConfigError::BelowMinimum { .. })));
    }

    #[tokio::test]
    async fn test_disabled_store_always_calls_backend() {
        let account = make_account("svc", "acct");
        let backend = TestBackend::new().with_valid(&account, "token1");
        let store = store(&backend, Duration::ZERO);

        let valid = make_token(&account, "token1", VALID_SECRET);
        let forged = make_token(&account, "token1", INVALID_SECRET);

        assert!(store.authenticate(&valid).await.unwrap());
        assert!(store.authenticate(&valid).await.unwrap());
        assert!(!store.authenticate(&forged).await.unwrap());
        assert_eq!(backend.validate_calls(), 3);

        store.invalidate(&["svc/acct/token1"]).await;
        store.invalidate_all().await;
    }

    #[tokio::test]
    async fn test_disabled_store_relays_backend_error() {
        let account = make_account("svc", "acct");
        let backend = TestBackend::new().with_valid(&account, "token1");
        backend.set_failure(Some(BackendError::connection("token file unreadable")));
        let store = store(&backend, Duration::ZERO);

        let err = store.authenticate(&make_token(&account, "token1", VALID_SECRET)).await;
        assert!(matches!(err, Err(AuthError::Backend(BackendError::Connection { .. }))));
    }

    #[tokio::test]
    async fn test_find_tokens_bypasses_cache() {
        let account = make_account("svc", "acct");
        let backend = TestBackend::new()
            .with_valid(&account, "token1")
            .with_valid(&account, "token2")
            .with_valid(&make_account("svc", "other"), "token1");
        let store = store(&backend, Duration::from_secs(60));

        let tokens = store.find_tokens_for(&account).await.unwrap();
        let names: Vec<_> = tokens.iter().map(|info| info.name.as_str()).collect();
        assert_eq!(names, ["token1", "token2"]);
        assert!(tokens.iter().all(|info| info.source == TokenSource::File));

        store.find_tokens_for(&account).await.unwrap();
        assert_eq!(backend.find_calls(), 2);
        assert_eq!(store.cache().unwrap().entry_count().await, 0);
    }
}
