//! One-way, salted secret verifiers.
//!
//! A [`Verifier`] is built from exactly one secret and can afterwards only
//! answer "is this candidate the same secret?". It holds no reversible form
//! of the original.
//!
//! # Algorithms
//!
//! | Algorithm | Cost | Stored form |
//! |-----------|------|-------------|
//! | [`HashAlgorithm::Ssha256`] | one SHA-256 | 32-byte salt + digest |
//! | [`HashAlgorithm::Argon2id`] | memory-hard | PHC string |
//!
//! `Ssha256` is the default because a cache verifier is consulted on every
//! authentication of a hot token.
//!
//! # Examples
//!
//! ```
//! use svcauth_storage::{HashAlgorithm, SecretString, Verifier};
//!
//! let verifier = Verifier::build(HashAlgorithm::Ssha256, &SecretString::from("right"))?;
//! assert!(verifier.matches(&SecretString::from("right")));
//! assert!(!verifier.matches(&SecretString::from("wrong")));
//! # Ok::<(), svcauth_storage::HashingError>(())
//! ```

use std::fmt;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::token::SecretString;

/// Salt length for salted SHA-256 verifiers.
pub const SSHA256_SALT_LEN: usize = 32;

/// Hashing algorithm used to build a [`Verifier`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// Salted SHA-256.
    #[default]
    Ssha256,
    /// Argon2id with the crate's default parameters.
    Argon2id,
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ssha256 => f.write_str("ssha256"),
            Self::Argon2id => f.write_str("argon2id"),
        }
    }
}

/// Building a verifier failed.
#[derive(Debug, Clone, Error)]
#[error("Failed to hash secret with {algorithm}: {message}")]
pub struct HashingError {
    algorithm: HashAlgorithm,
    message: String,
}

impl HashingError {
    fn new(algorithm: HashAlgorithm, message: impl Into<String>) -> Self {
        Self { algorithm, message: message.into() }
    }

    /// Returns the algorithm that failed.
    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }
}

#[derive(Clone)]
enum Stored {
    Ssha256 { salt: [u8; SSHA256_SALT_LEN], digest: [u8; 32] },
    Argon2id { phc: String },
}

/// Salted one-way fingerprint of a single secret.
#[derive(Clone)]
pub struct Verifier {
    stored: Stored,
}

impl Verifier {
    /// Builds a verifier from `secret` with a fresh random salt.
    ///
    /// # Errors
    ///
    /// Returns [`HashingError`] if the underlying hasher rejects its input.
    /// Salted SHA-256 never fails.
    pub fn build(algorithm: HashAlgorithm, secret: &SecretString) -> Result<Self, HashingError> {
        let stored = match algorithm {
            HashAlgorithm::Ssha256 => {
                let mut salt = [0u8; SSHA256_SALT_LEN];
                OsRng.fill_bytes(&mut salt);
                let digest = ssha256(&salt, secret);
                Stored::Ssha256 { salt, digest }
            },
            HashAlgorithm::Argon2id => {
                let salt = SaltString::generate(&mut OsRng);
                let phc = Argon2::default()
                    .hash_password(secret.expose_secret().as_bytes(), &salt)
                    .map_err(|e| HashingError::new(algorithm, e.to_string()))?
                    .to_string();
                Stored::Argon2id { phc }
            },
        };
        Ok(Self { stored })
    }

    /// Returns the algorithm this verifier was built with.
    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        match self.stored {
            Stored::Ssha256 { .. } => HashAlgorithm::Ssha256,
            Stored::Argon2id { .. } => HashAlgorithm::Argon2id,
        }
    }

    /// Returns `true` if `candidate` is the secret this verifier was built from.
    ///
    /// Digest comparison is constant-time. A stored form that cannot be parsed
    /// yields `false`.
    #[must_use]
    pub fn matches(&self, candidate: &SecretString) -> bool {
        match &self.stored {
            Stored::Ssha256 { salt, digest } => {
                bool::from(ssha256(salt, candidate).as_slice().ct_eq(digest.as_slice()))
            },
            Stored::Argon2id { phc } => match PasswordHash::new(phc) {
                Ok(parsed) => Argon2::default()
                    .verify_password(candidate.expose_secret().as_bytes(), &parsed)
                    .is_ok(),
                Err(err) => {
                    tracing::warn!(error = %err, "unparseable argon2 verifier");
                    false
                },
            },
        }
    }
}

impl fmt::Debug for Verifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Verifier").field("algorithm", &self.algorithm()).finish_non_exhaustive()
    }
}

fn ssha256(salt: &[u8], secret: &SecretString) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(secret.expose_secret().as_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::ssha256(HashAlgorithm::Ssha256)]
    #[case::argon2id(HashAlgorithm::Argon2id)]
    fn test_matches_only_original_secret(#[case] algorithm: HashAlgorithm) {
        let verifier =
            Verifier::build(algorithm, &"super-secret-value".into()).expect("build verifier");

        assert_eq!(verifier.algorithm(), algorithm);
        assert!(verifier.matches(&"super-secret-value".into()));
        assert!(!verifier.matches(&"some-fishy-value".into()));
        assert!(!verifier.matches(&"".into()));
        assert!(!verifier.matches(&"super-secret-valuE".into()));
    }

    #[test]
    fn test_same_secret_gets_distinct_salts() {
        let secret = SecretString::from("repeated");
        let a = Verifier::build(HashAlgorithm::Ssha256, &secret).expect("build a");
        let b = Verifier::build(HashAlgorithm::Ssha256, &secret).expect("build b");

        match (&a.stored, &b.stored) {
            (Stored::Ssha256 { salt: sa, digest: da }, Stored::Ssha256 { salt: sb, digest: db }) => {
                assert_ne!(sa, sb);
                assert_ne!(da, db);
            },
            _ => panic!("expected ssha256 verifiers"),
        }
        assert!(a.matches(&secret));
        assert!(b.matches(&secret));
    }

    #[test]
    fn test_stored_form_holds_no_plaintext() {
        let secret = "plaintext-marker-1234";
        let verifier = Verifier::build(HashAlgorithm::Argon2id, &secret.into()).expect("build");

        let Stored::Argon2id { phc } = &verifier.stored else { panic!("expected argon2") };
        assert!(phc.starts_with("$argon2id$"));
        assert!(!phc.contains(secret));
        assert!(!format!("{verifier:?}").contains(secret));
    }

    #[test]
    fn test_malformed_argon2_state_never_matches() {
        let verifier = Verifier { stored: Stored::Argon2id { phc: "not-a-phc-string".into() } };
        assert!(!verifier.matches(&"anything".into()));
    }

    #[test]
    fn test_hash_algorithm_serde() {
        let parsed: HashAlgorithm = serde_json::from_str("\"argon2id\"").expect("parse");
        assert_eq!(parsed, HashAlgorithm::Argon2id);
        assert_eq!(HashAlgorithm::default(), HashAlgorithm::Ssha256);
        assert_eq!(HashAlgorithm::Ssha256.to_string(), "ssha256");
    }
}
