//! Service account token model and backend contracts.
//!
//! This crate provides the value types, secret verifiers and backend trait
//! that the caching authentication layer in `svcauth-authn` builds on.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  svcauth-authn                           │
//! │    CachingTokenStore → TokenCache → ResultCell           │
//! ├──────────────────────────────────────────────────────────┤
//! │                  svcauth-storage                         │
//! │  ServiceAccountToken │ Verifier │ TokenBackend trait     │
//! ├───────────────────────────┬──────────────────────────────┤
//! │   MemoryTokenBackend      │  file / index / remote store │
//! │   (testing)               │  (provided by the host)      │
//! └───────────────────────────┴──────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use svcauth_storage::{MemoryTokenBackend, ServiceAccountId, ServiceAccountToken, TokenBackend};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = MemoryTokenBackend::new();
//!     let account = ServiceAccountId::new("elastic", "fleet-server")?;
//!     let token = ServiceAccountToken::new_token(account, "token1")?;
//!     backend.create_token(&token)?;
//!
//!     assert!(backend.validate(&token).await?);
//!     Ok(())
//! }
//! ```
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with a scriptable backend and token generators.
//!   Enable this in `[dev-dependencies]` for integration tests.

#![deny(unsafe_code)]

pub mod backend;
pub mod error;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
pub mod token;
pub mod verifier;

// Re-export primary types at crate root for convenience
pub use backend::{MemoryTokenBackend, TokenBackend};
pub use error::{BackendError, BackendResult, BoxError};
pub use token::{
    IdentityError, MAX_TOKEN_NAME_LEN, PRINCIPAL_SEPARATOR, SecretString, ServiceAccountId,
    ServiceAccountToken, TokenInfo, TokenSource,
};
pub use verifier::{HashAlgorithm, HashingError, Verifier};
pub use zeroize::Zeroizing;
