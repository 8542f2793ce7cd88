//! Configuration for the token cache.
//!
//! [`TokenCacheConfig`] carries the three knobs of the caching layer. A zero
//! TTL turns caching off entirely: no cache structure is allocated and every
//! authentication reaches the backend.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use svcauth_authn::TokenCacheConfig;
//! use svcauth_storage::HashAlgorithm;
//!
//! let config = TokenCacheConfig::builder()
//!     .ttl(Duration::from_secs(600))
//!     .max_tokens(5_000)
//!     .hash_algorithm(HashAlgorithm::Ssha256)
//!     .build()?;
//! assert!(config.is_enabled());
//!
//! let from_file: TokenCacheConfig = serde_json::from_str(r#"{ "ttl": "0s" }"#)?;
//! assert!(!from_file.is_enabled());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use svcauth_storage::HashAlgorithm;

use crate::error::ConfigError;

/// Default cache TTL (20 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(20 * 60);

/// Default maximum number of cached qualified names.
pub const DEFAULT_MAX_TOKENS: u64 = 100_000;

/// Token cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenCacheConfig {
    /// Entry time-to-live. Zero disables caching.
    #[serde(with = "humantime_serde", default = "default_ttl")]
    pub(crate) ttl: Duration,

    /// Maximum number of cached qualified names.
    #[serde(default = "default_max_tokens")]
    pub(crate) max_tokens: u64,

    /// Algorithm for cached verifiers.
    #[serde(default)]
    pub(crate) hash_algorithm: HashAlgorithm,
}

fn default_ttl() -> Duration {
    DEFAULT_CACHE_TTL
}

fn default_max_tokens() -> u64 {
    DEFAULT_MAX_TOKENS
}

impl Default for TokenCacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
            max_tokens: DEFAULT_MAX_TOKENS,
            hash_algorithm: HashAlgorithm::default(),
        }
    }
}

#[bon::bon]
impl TokenCacheConfig {
    /// Creates a validated configuration.
    ///
    /// # Optional Fields
    ///
    /// * `ttl` - Entry time-to-live (default: 20 minutes). Zero disables caching.
    /// * `max_tokens` - Size bound (default: 100 000).
    /// * `hash_algorithm` - Verifier algorithm (default: salted SHA-256).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BelowMinimum`] if `max_tokens` is zero.
    #[builder]
    pub fn new(
        #[builder(default = DEFAULT_CACHE_TTL)] ttl: Duration,
        #[builder(default = DEFAULT_MAX_TOKENS)] max_tokens: u64,
        #[builder(default)] hash_algorithm: HashAlgorithm,
    ) -> Result<Self, ConfigError> {
        let config = Self { ttl, max_tokens, hash_algorithm };
        config.validate()?;
        Ok(config)
    }

    /// Returns a configuration with caching turned off.
    #[must_use]
    pub fn disabled() -> Self {
        Self { ttl: Duration::ZERO, ..Self::default() }
    }

    /// Re-checks a configuration, e.g. one obtained through deserialization.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BelowMinimum`] if `max_tokens` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tokens == 0 {
            return Err(ConfigError::BelowMinimum {
                field: "max_tokens",
                value: self.max_tokens.to_string(),
                min: "1".to_owned(),
            });
        }
        Ok(())
    }

    /// Returns `true` unless the TTL is zero.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// Returns the entry TTL.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the size bound.
    #[must_use]
    pub fn max_tokens(&self) -> u64 {
        self.max_tokens
    }

    /// Returns the verifier algorithm.
    #[must_use]
    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash_algorithm
    }
}
