//! Shared test utilities for token backend testing.
//!
//! This module provides a scriptable [`TestBackend`] and small token
//! generators. It is feature-gated behind `testutil` to prevent leaking into
//! production builds.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! svcauth-storage = { path = "../storage", features = ["testutil"] }
//! ```
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use svcauth_storage::testutil::{TestBackend, make_account, make_token};
//! ```

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::{
    MemoryTokenBackend, TokenBackend,
    error::{BackendError, BackendResult},
    token::{SecretString, ServiceAccountId, ServiceAccountToken, TokenInfo},
};

/// Secret accepted by tokens registered through [`TestBackend::with_valid`].
pub const VALID_SECRET: &str = "super-secret-value";

/// A secret that is never registered.
pub const INVALID_SECRET: &str = "some-fishy-value";

/// Create an account identity for tests.
///
/// # Panics
///
/// Panics if either component is rejected by [`ServiceAccountId::new`].
#[must_use]
pub fn make_account(namespace: &str, service_name: &str) -> ServiceAccountId {
    ServiceAccountId::new(namespace, service_name).expect("valid test account")
}

/// Create a token with an explicit secret.
///
/// # Panics
///
/// Panics if `name` is rejected by [`ServiceAccountToken::new`].
#[must_use]
pub fn make_token(account: &ServiceAccountId, name: &str, secret: &str) -> ServiceAccountToken {
    ServiceAccountToken::new(account.clone(), name, SecretString::from(secret))
        .expect("valid test token")
}

/// Issue a token with a random secret.
///
/// # Panics
///
/// Panics if `name` is rejected by [`ServiceAccountToken::new_token`].
#[must_use]
pub fn issue_token(account: &ServiceAccountId, name: &str) -> ServiceAccountToken {
    ServiceAccountToken::new_token(account.clone(), name).expect("valid test token")
}

/// Scriptable [`TokenBackend`] wrapping a [`MemoryTokenBackend`].
///
/// Counts `validate` calls and can inject failures, add latency, or hold
/// calls at a gate until the test releases them.
#[derive(Clone, Default)]
pub struct TestBackend {
    inner: MemoryTokenBackend,
    state: Arc<TestState>,
}

#[derive(Default)]
struct TestState {
    validate_calls: AtomicUsize,
    find_calls: AtomicUsize,
    failure: Mutex<Option<BackendError>>,
    delay: Mutex<Duration>,
    gate_enabled: AtomicBool,
    gate: Notify,
    started: Notify,
}

impl TestBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name` under `account` with [`VALID_SECRET`].
    ///
    /// # Panics
    ///
    /// Panics if the name is already registered.
    #[must_use]
    pub fn with_valid(self, account: &ServiceAccountId, name: &str) -> Self {
        self.register(&make_token(account, name, VALID_SECRET));
        self
    }

    /// Registers `token` with its own secret.
    ///
    /// # Panics
    ///
    /// Panics if the qualified name is already registered.
    pub fn register(&self, token: &ServiceAccountToken) {
        self.inner.create_token(token).expect("register test token");
    }

    /// Returns the wrapped in-memory store.
    #[must_use]
    pub fn inner(&self) -> &MemoryTokenBackend {
        &self.inner
    }

    /// Number of `validate` calls since creation or the last reset.
    #[must_use]
    pub fn validate_calls(&self) -> usize {
        self.state.validate_calls.load(Ordering::SeqCst)
    }

    /// Number of `find_tokens_for` calls since creation.
    #[must_use]
    pub fn find_calls(&self) -> usize {
        self.state.find_calls.load(Ordering::SeqCst)
    }

    /// Resets the `validate` call counter.
    pub fn reset_calls(&self) {
        self.state.validate_calls.store(0, Ordering::SeqCst);
    }

    /// Makes every subsequent call fail with `failure`, or clears it.
    pub fn set_failure(&self, failure: Option<BackendError>) {
        *self.state.failure.lock() = failure;
    }

    /// Delays every `validate` call by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.state.delay.lock() = delay;
    }

    /// Holds subsequent `validate` calls until [`open_gate`](Self::open_gate).
    pub fn enable_gate(&self) {
        self.state.gate_enabled.store(true, Ordering::SeqCst);
    }

    /// Releases one held `validate` call and disables the gate.
    pub fn open_gate(&self) {
        self.state.gate_enabled.store(false, Ordering::SeqCst);
        self.state.gate.notify_one();
    }

    /// Resolves once a `validate` call is held at the gate.
    pub async fn started(&self) {
        self.state.started.notified().await;
    }
}

#[async_trait]
impl TokenBackend for TestBackend {
    async fn validate(&self, token: &ServiceAccountToken) -> BackendResult<bool> {
        self.state.validate_calls.fetch_add(1, Ordering::SeqCst);

        if self.state.gate_enabled.load(Ordering::SeqCst) {
            self.state.started.notify_one();
            self.state.gate.notified().await;
        }

        let delay = *self.state.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let failure = self.state.failure.lock().clone();
        if let Some(err) = failure {
            return Err(err);
        }
        self.inner.validate(token).await
    }

    async fn find_tokens_for(&self, account_id: &ServiceAccountId) -> BackendResult<Vec<TokenInfo>> {
        self.state.find_calls.fetch_add(1, Ordering::SeqCst);
        let failure = self.state.failure.lock().clone();
        if let Some(err) = failure {
            return Err(err);
        }
        self.inner.find_tokens_for(account_id).await
    }
}
