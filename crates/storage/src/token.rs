//! Service account identity and token value types.
//!
//! A [`ServiceAccountToken`] names one credential slot,
//! `{namespace}/{service_name}/{token_name}`, and carries the secret that a
//! caller presented for it. The qualified name is the cache key and the
//! target of invalidation; the secret never participates in equality,
//! hashing, or `Debug` output.
//!
//! # Examples
//!
//! ```
//! use svcauth_storage::{SecretString, ServiceAccountId, ServiceAccountToken};
//!
//! let account = ServiceAccountId::new("elastic", "fleet-server")?;
//! assert_eq!(account.principal(), "elastic/fleet-server");
//!
//! let token = ServiceAccountToken::new(account.clone(), "token1", SecretString::from("s3cr3t"))?;
//! assert_eq!(token.qualified_name(), "elastic/fleet-server/token1");
//! assert!(!format!("{token:?}").contains("s3cr3t"));
//!
//! // Components may not smuggle in a separator.
//! assert!(ServiceAccountToken::new(account, "a/b", SecretString::from("s3cr3t")).is_err());
//! # Ok::<(), svcauth_storage::IdentityError>(())
//! ```

use std::{
    fmt,
    hash::{Hash, Hasher},
};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

/// Separator between the components of a principal or qualified name.
///
/// An invalidation key ending with this character is an account prefix.
pub const PRINCIPAL_SEPARATOR: char = '/';

/// Maximum length of a token name, in characters.
pub const MAX_TOKEN_NAME_LEN: usize = 256;

/// Number of random bytes in a generated token secret.
const GENERATED_SECRET_LEN: usize = 16;

/// Rejected account or token identity component.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum IdentityError {
    /// A component is empty.
    #[error("{component} must not be empty")]
    Empty {
        /// Which component.
        component: &'static str,
    },

    /// A component contains [`PRINCIPAL_SEPARATOR`].
    #[error("{component} [{value}] must not contain '{sep}'", sep = PRINCIPAL_SEPARATOR)]
    ContainsSeparator {
        /// Which component.
        component: &'static str,
        /// The rejected value.
        value: String,
    },

    /// A token name outside the allowed charset or length.
    #[error(
        "invalid token name [{name}]: must be 1 to {max} characters from [A-Za-z0-9_-] \
         and must not begin with '_'",
        max = MAX_TOKEN_NAME_LEN
    )]
    InvalidTokenName {
        /// The rejected name.
        name: String,
    },
}

fn check_component(component: &'static str, value: &str) -> Result<(), IdentityError> {
    if value.is_empty() {
        return Err(IdentityError::Empty { component });
    }
    if value.contains(PRINCIPAL_SEPARATOR) {
        return Err(IdentityError::ContainsSeparator { component, value: value.to_owned() });
    }
    Ok(())
}

fn check_token_name(name: &str) -> Result<(), IdentityError> {
    check_component("token_name", name)?;
    let valid = name.len() <= MAX_TOKEN_NAME_LEN
        && !name.starts_with('_')
        && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if !valid {
        return Err(IdentityError::InvalidTokenName { name: name.to_owned() });
    }
    Ok(())
}

/// Secret material presented with a token.
///
/// The buffer is zeroed on drop and `Debug` is redacted. No `Display` or
/// `PartialEq`; compare secrets through a [`Verifier`](crate::Verifier).
#[derive(Clone)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
    /// Wraps an owned string as secret material.
    #[must_use]
    pub fn new(secret: String) -> Self {
        Self(Zeroizing::new(secret))
    }

    /// Returns the secret bytes for hashing and comparison.
    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the secret is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for SecretString {
    fn from(secret: &str) -> Self {
        Self::new(secret.to_owned())
    }
}

impl From<String> for SecretString {
    fn from(secret: String) -> Self {
        Self::new(secret)
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(***)")
    }
}

/// Identity of a service account: a namespace plus a service name.
///
/// Neither component is empty or contains [`PRINCIPAL_SEPARATOR`], so an
/// account's [`token_prefix`](Self::token_prefix) never covers another
/// account's tokens.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawServiceAccountId")]
pub struct ServiceAccountId {
    namespace: String,
    service_name: String,
}

#[derive(Deserialize)]
struct RawServiceAccountId {
    namespace: String,
    service_name: String,
}

impl TryFrom<RawServiceAccountId> for ServiceAccountId {
    type Error = IdentityError;

    fn try_from(raw: RawServiceAccountId) -> Result<Self, Self::Error> {
        Self::new(raw.namespace, raw.service_name)
    }
}

impl ServiceAccountId {
    /// Creates a new account identity.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError`] if either component is empty or contains
    /// [`PRINCIPAL_SEPARATOR`].
    pub fn new(
        namespace: impl Into<String>,
        service_name: impl Into<String>,
    ) -> Result<Self, IdentityError> {
        let namespace = namespace.into();
        let service_name = service_name.into();
        check_component("namespace", &namespace)?;
        check_component("service_name", &service_name)?;
        Ok(Self { namespace, service_name })
    }

    /// Returns the namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the service name.
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Returns `namespace/service_name`.
    #[must_use]
    pub fn principal(&self) -> String {
        format!("{}{PRINCIPAL_SEPARATOR}{}", self.namespace, self.service_name)
    }

    /// Returns the invalidation prefix covering every token of this account,
    /// i.e. the principal followed by [`PRINCIPAL_SEPARATOR`].
    #[must_use]
    pub fn token_prefix(&self) -> String {
        format!("{}{PRINCIPAL_SEPARATOR}", self.principal())
    }
}

impl fmt::Display for ServiceAccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{PRINCIPAL_SEPARATOR}{}", self.namespace, self.service_name)
    }
}

/// A named credential issued to a service account, together with the secret
/// presented for it.
///
/// Two tokens with the same qualified name but different secrets are distinct
/// credentials for the same identity slot; they compare equal.
#[derive(Clone)]
pub struct ServiceAccountToken {
    account_id: ServiceAccountId,
    token_name: String,
    qualified_name: String,
    secret: SecretString,
}

impl ServiceAccountToken {
    /// Creates a token from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError`] if `token_name` is empty, longer than
    /// [`MAX_TOKEN_NAME_LEN`], begins with `_`, or has a character outside
    /// `[A-Za-z0-9_-]`.
    pub fn new(
        account_id: ServiceAccountId,
        token_name: impl Into<String>,
        secret: SecretString,
    ) -> Result<Self, IdentityError> {
        let token_name = token_name.into();
        check_token_name(&token_name)?;
        let qualified_name = format!("{}{PRINCIPAL_SEPARATOR}{token_name}", account_id.principal());
        Ok(Self { account_id, token_name, qualified_name, secret })
    }

    /// Issues a new token with a freshly generated random secret.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError`] under the same rules as [`new`](Self::new).
    pub fn new_token(
        account_id: ServiceAccountId,
        token_name: impl Into<String>,
    ) -> Result<Self, IdentityError> {
        let mut bytes = Zeroizing::new([0u8; GENERATED_SECRET_LEN]);
        OsRng.fill_bytes(&mut bytes[..]);
        let secret = SecretString::new(URL_SAFE_NO_PAD.encode(&bytes[..]));
        Self::new(account_id, token_name, secret)
    }

    /// Returns the owning account.
    #[must_use]
    pub fn account_id(&self) -> &ServiceAccountId {
        &self.account_id
    }

    /// Returns the token name.
    #[must_use]
    pub fn token_name(&self) -> &str {
        &self.token_name
    }

    /// Returns `namespace/service_name/token_name`, the cache key.
    #[must_use]
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    /// Returns the presented secret.
    #[must_use]
    pub fn secret(&self) -> &SecretString {
        &self.secret
    }
}

impl PartialEq for ServiceAccountToken {
    fn eq(&self, other: &Self) -> bool {
        self.account_id == other.account_id && self.token_name == other.token_name
    }
}

impl Eq for ServiceAccountToken {}

impl Hash for ServiceAccountToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.account_id.hash(state);
        self.token_name.hash(state);
    }
}

impl fmt::Debug for ServiceAccountToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountToken")
            .field("qualified_name", &self.qualified_name)
            .finish_non_exhaustive()
    }
}

/// Where a listed token is defined.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSource {
    /// A hashed-credential file on the local node.
    File,
    /// A shared index.
    Index,
}

/// Descriptor of a token returned by
/// [`TokenBackend::find_tokens_for`](crate::TokenBackend::find_tokens_for).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// Token name, without the account principal.
    pub name: String,
    /// Where the token is defined.
    pub source: TokenSource,
}

impl TokenInfo {
    /// Creates a descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>, source: TokenSource) -> Self {
        Self { name: name.into(), source }
    }
}
