//! # Service Account Token Authentication
//!
//! Caching credential verification in front of an authoritative
//! [`TokenBackend`](svcauth_storage::TokenBackend).
//!
//! This crate provides:
//! - **Caching token store**: [`CachingTokenStore`] answers repeated authentications locally
//! - **Coalescing**: concurrent misses on one qualified name share a single backend call
//! - **Invalidation**: by qualified name, by account prefix, or wholesale
//!
//! ## Features
//!
//! - Only successful validations are cached, as a salted one-way [`Verifier`](svcauth_storage::Verifier)
//! - A request presenting a different secret for a cached name is rejected without a backend call
//! - A zero TTL disables caching and allocates no cache
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use svcauth_authn::{CachingTokenStore, TokenCacheConfig};
//! use svcauth_storage::{MemoryTokenBackend, ServiceAccountId, ServiceAccountToken};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = Arc::new(MemoryTokenBackend::new());
//! let config = TokenCacheConfig::builder().ttl(Duration::from_secs(600)).build()?;
//! let store = CachingTokenStore::new(backend, config)?;
//!
//! let account = ServiceAccountId::new("elastic", "fleet-server")?;
//! let token = ServiceAccountToken::new(account.clone(), "token1", "presented-secret".into())?;
//! if store.authenticate(&token).await? {
//!     println!("authenticated {}", token.qualified_name());
//! }
//!
//! // Drop every cached token of the account.
//! store.invalidate(&[account.token_prefix()]).await;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Single-assignment result cell for coalesced validations.
pub mod cell;
/// Token cache configuration.
pub mod config;
/// Authentication error types.
pub mod error;
/// Token cache counters.
pub mod metrics;
/// Caching token store.
pub mod store;
/// Coalescing credential cache.
pub mod token_cache;

// Re-export key types for convenience
pub use cell::{Resolution, ResultCell};
pub use config::{DEFAULT_CACHE_TTL, DEFAULT_MAX_TOKENS, TokenCacheConfig};
pub use error::{AuthError, ConfigError, Result};
pub use metrics::{TokenCacheMetrics, TokenCacheMetricsSnapshot};
pub use store::CachingTokenStore;
pub use token_cache::TokenCache;
