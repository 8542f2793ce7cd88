//! Coalescing credential cache.
//!
//! [`TokenCache`] maps qualified token names to [`ResultCell`]s. The first
//! caller to miss on a name installs a pending cell and starts exactly one
//! backend validation for it; every concurrent caller for the same name joins
//! that cell instead of calling the backend again.
//!
//! # Cache Strategy
//!
//! - **Positive only**: a cell that resolves valid stays cached with a [`Verifier`] built from the
//!   secret that validated. Invalid and failed cells are evicted before they are published, so
//!   the next request always reaches the backend.
//! - **Local rejection**: a later request for a cached name is answered by
//!   [`Verifier::matches`] against its own secret, without a backend call.
//! - **Eviction**: time-to-live from cell creation plus a capacity bound.
//! - **Invalidation**: exact qualified names, or account prefixes ending in
//!   [`PRINCIPAL_SEPARATOR`].
//!
//! The backend call runs in its own task. Dropping an `authenticate` future
//! abandons only that caller's wait.

use std::{future::ready, sync::Arc};

use fail::fail_point;
use moka::{future::Cache, ops::compute::Op};
use svcauth_storage::{
    BackendError, BackendResult, HashAlgorithm, PRINCIPAL_SEPARATOR, ServiceAccountToken,
    TokenBackend, Verifier,
};
use tracing::Instrument;

use crate::{
    cell::{Resolution, ResultCell},
    config::TokenCacheConfig,
    error::{AuthError, Result},
    metrics::{TokenCacheMetrics, TokenCacheMetricsSnapshot},
};

/// Time-and-size bounded map from qualified name to validation cell.
///
/// Cloning is cheap and yields a handle to the same cache.
#[derive(Clone)]
pub struct TokenCache {
    cells: Cache<String, Arc<ResultCell>>,
    hash_algorithm: HashAlgorithm,
    metrics: Arc<TokenCacheMetrics>,
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache")
            .field("entries", &self.cells.entry_count())
            .field("hash_algorithm", &self.hash_algorithm)
            .finish_non_exhaustive()
    }
}

impl TokenCache {
    /// Creates an empty cache sized and timed by `config`.
    ///
    /// The caller is expected to have checked [`TokenCacheConfig::is_enabled`];
    /// a zero TTL here produces a cache whose entries expire immediately.
    #[must_use]
    pub fn new(config: &TokenCacheConfig) -> Self {
        let cells = Cache::builder()
            .name("service-account-tokens")
            .time_to_live(config.ttl())
            .max_capacity(config.max_tokens())
            .build();
        Self {
            cells,
            hash_algorithm: config.hash_algorithm(),
            metrics: Arc::new(TokenCacheMetrics::new()),
        }
    }

    /// Authenticates `token`, coalescing concurrent misses onto one backend call.
    ///
    /// Resolves to `Ok(false)` for a wrong secret. Backend failures are
    /// relayed to every caller that joined the failed attempt.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) async fn authenticate(
        &self,
        token: &ServiceAccountToken,
        backend: &Arc<dyn TokenBackend>,
    ) -> Result<bool> {
        let key = token.qualified_name();
        let (created, cell) = loop {
            let entry = self
                .cells
                .entry_by_ref(key)
                .or_insert_with(async { Arc::new(ResultCell::new()) })
                .await;
            let created = entry.is_fresh();
            let cell = entry.into_value();

            // Only an abandoned validation leaves a non-valid resolution in the map.
            if !created
                && let Some(resolution) = cell.peek()
                && !matches!(resolution, Resolution::Valid(_))
            {
                evict_cell(&self.cells, key, &cell).await;
                continue;
            }
            break (created, cell);
        };

        if created {
            self.metrics.record_miss();
            tracing::debug!(cache = "tokens", "cache miss");
            self.spawn_validation(Arc::clone(&cell), token.clone(), Arc::clone(backend));
        } else if cell.is_resolved() {
            self.metrics.record_hit();
            tracing::debug!(cache = "tokens", "cache hit");
        } else {
            self.metrics.record_coalesced();
            tracing::debug!(cache = "tokens", "joined in-flight validation");
        }

        match cell.wait().await {
            // The creator's own secret is the one that validated.
            Resolution::Valid(verifier) => Ok(created || verifier.matches(token.secret())),
            Resolution::Invalid => Ok(false),
            Resolution::Failed(err) => Err(err),
        }
    }

    fn spawn_validation(
        &self,
        cell: Arc<ResultCell>,
        token: ServiceAccountToken,
        backend: Arc<dyn TokenBackend>,
    ) {
        let cells = self.cells.clone();
        let metrics = Arc::clone(&self.metrics);
        let algorithm = self.hash_algorithm;

        tokio::spawn(
            async move {
                let _abandoned = AbandonGuard(Arc::clone(&cell));
                let resolution = validate(&token, backend, algorithm, &metrics).await;
                if !matches!(resolution, Resolution::Valid(_)) {
                    evict_cell(&cells, token.qualified_name(), &cell).await;
                }
                cell.resolve(resolution);
            }
            .in_current_span(),
        );
    }

    /// Removes cached entries.
    ///
    /// A key ending in [`PRINCIPAL_SEPARATOR`] removes every entry whose
    /// qualified name starts with it; any other key removes the exact entry.
    /// Unknown keys are ignored. Validations already in flight are not
    /// cancelled.
    #[tracing::instrument(skip(self))]
    pub async fn invalidate<S: AsRef<str> + std::fmt::Debug>(&self, keys: &[S]) {
        for key in keys {
            let key = key.as_ref();
            let removed = if key.ends_with(PRINCIPAL_SEPARATOR) {
                self.invalidate_prefix(key).await
            } else {
                u64::from(self.cells.remove(key).await.is_some())
            };
            self.metrics.record_invalidations(removed);
            tracing::info!(
                audit.action = "invalidate_token_cache",
                audit.resource = key,
                audit.result = "success",
                audit.removed = removed,
                "audit_event"
            );
        }
    }

    async fn invalidate_prefix(&self, prefix: &str) -> u64 {
        let matching: Vec<Arc<String>> = self
            .cells
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, _)| name)
            .collect();

        let mut removed = 0;
        for name in matching {
            if self.cells.remove(name.as_str()).await.is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Removes every entry.
    #[tracing::instrument(skip(self))]
    pub async fn invalidate_all(&self) {
        self.cells.run_pending_tasks().await;
        let evicted = self.cells.entry_count();
        self.cells.invalidate_all();
        self.cells.run_pending_tasks().await;
        self.metrics.record_invalidations(evicted);
        tracing::info!(
            audit.action = "clear_token_cache",
            audit.resource = "all_service_account_tokens",
            audit.result = "success",
            audit.evicted = evicted,
            "audit_event"
        );
    }

    /// Returns the exact number of cached qualified names.
    ///
    /// Settles pending expiry and invalidation work first. Cells whose
    /// validation is still in flight are counted.
    pub async fn entry_count(&self) -> u64 {
        self.cells.run_pending_tasks().await;
        self.cells.entry_count()
    }

    /// Returns `true` if `qualified_name` has a live entry.
    #[must_use]
    pub fn contains(&self, qualified_name: &str) -> bool {
        self.cells.contains_key(qualified_name)
    }

    /// Returns a snapshot of the cache counters.
    #[must_use]
    pub fn metrics(&self) -> TokenCacheMetricsSnapshot {
        self.metrics.snapshot()
    }
}

/// Resolves a still-pending cell as abandoned when the validation task is
/// dropped, e.g. on runtime shutdown.
struct AbandonGuard(Arc<ResultCell>);

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        if self.0.resolve(Resolution::Failed(AuthError::ValidationAbandoned)) {
            tracing::warn!("token validation dropped before it resolved");
        }
    }
}

/// Runs one backend validation and turns its outcome into a [`Resolution`].
///
/// The backend call runs in a nested task so that a panicking backend still
/// yields a resolution.
async fn validate(
    token: &ServiceAccountToken,
    backend: Arc<dyn TokenBackend>,
    algorithm: HashAlgorithm,
    metrics: &TokenCacheMetrics,
) -> Resolution {
    let call = {
        let token = token.clone();
        tokio::spawn(async move { call_backend(backend.as_ref(), &token).await }.in_current_span())
    };
    let outcome = match call.await {
        Ok(outcome) => outcome,
        Err(join_err) => {
            Err(BackendError::internal_with_source("token backend task failed", join_err))
        },
    };

    match outcome {
        Ok(true) => match Verifier::build(algorithm, token.secret()) {
            Ok(verifier) => Resolution::Valid(Arc::new(verifier)),
            Err(err) => {
                metrics.record_backend_failure();
                tracing::warn!(error = %err, "failed to build verifier for validated token");
                Resolution::Failed(err.into())
            },
        },
        Ok(false) => {
            metrics.record_invalid();
            tracing::debug!("backend rejected token secret");
            Resolution::Invalid
        },
        Err(err) => {
            metrics.record_backend_failure();
            tracing::warn!(error = %err, "token backend validation failed");
            Resolution::Failed(err.into())
        },
    }
}

async fn call_backend(
    backend: &dyn TokenBackend,
    token: &ServiceAccountToken,
) -> BackendResult<bool> {
    fail_point!("token-cache-before-backend", |_| {
        Err(BackendError::internal("injected failure before backend validation"))
    });
    backend.validate(token).await
}

/// Removes `cell` from the map if it is still the entry for `key`.
///
/// A newer cell installed under the same key after an invalidation is left
/// alone.
async fn evict_cell(cells: &Cache<String, Arc<ResultCell>>, key: &str, cell: &Arc<ResultCell>) {
    let _ = cells
        .entry_by_ref(key)
        .and_compute_with(|current| {
            let op = match current {
                Some(entry) if Arc::ptr_eq(entry.value(), cell) => Op::Remove,
                _ => Op::Nop,
            };
            ready(op)
        })
        .await;
}
