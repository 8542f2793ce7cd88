//! Counters for the token cache.
//!
//! # Examples
//!
//! ```
//! use svcauth_authn::TokenCacheMetrics;
//!
//! let metrics = TokenCacheMetrics::new();
//! metrics.record_hit();
//! metrics.record_miss();
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.hits, 1);
//! assert_eq!(snapshot.misses, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of token cache counters at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenCacheMetricsSnapshot {
    /// Authentications answered from a resolved cache entry.
    pub hits: u64,
    /// Authentications that started a backend validation.
    pub misses: u64,
    /// Authentications that joined a validation already in flight.
    pub coalesced: u64,
    /// Validations that ended in a backend or hashing failure.
    pub backend_failures: u64,
    /// Validations in which the backend rejected the secret.
    pub invalid_results: u64,
    /// Entries removed by explicit invalidation.
    pub invalidations: u64,
}

/// Lock-free counters for the token cache.
#[derive(Debug, Default)]
pub struct TokenCacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    backend_failures: AtomicU64,
    invalid_results: AtomicU64,
    invalidations: AtomicU64,
}

impl TokenCacheMetrics {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a cache hit.
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a miss that started a backend validation.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a caller joining an in-flight validation.
    pub fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed validation.
    pub fn record_backend_failure(&self) {
        self.backend_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a rejected secret.
    pub fn record_invalid(&self) {
        self.invalid_results.fetch_add(1, Ordering::Relaxed);
    }

    /// Records `count` entries removed by invalidation.
    pub fn record_invalidations(&self, count: u64) {
        self.invalidations.fetch_add(count, Ordering::Relaxed);
    }

    /// Returns a consistent-enough copy of all counters.
    #[must_use]
    pub fn snapshot(&self) -> TokenCacheMetricsSnapshot {
        TokenCacheMetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            backend_failures: self.backend_failures.load(Ordering::Relaxed),
            invalid_results: self.invalid_results.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}
