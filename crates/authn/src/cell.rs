//! Single-assignment result slot shared by coalesced callers.
//!
//! A [`ResultCell`] starts pending, is resolved exactly once by the task that
//! owns the backend call, and wakes every waiter with the same
//! [`Resolution`]. Waiting is cooperative (a `tokio::sync::watch` channel), so
//! waiters never block a worker thread and a waiter that arrives after
//! resolution returns immediately.

use std::sync::Arc;

use svcauth_storage::Verifier;
use tokio::sync::watch;

use crate::error::AuthError;

/// Terminal outcome of one validation.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// The backend accepted the secret; carries its verifier.
    Valid(Arc<Verifier>),
    /// The backend rejected the secret.
    Invalid,
    /// No verdict could be reached.
    Failed(AuthError),
}

/// In-flight or completed validation of one qualified name.
#[derive(Debug)]
pub struct ResultCell {
    state: watch::Sender<Option<Resolution>>,
}

impl Default for ResultCell {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultCell {
    /// Creates a pending cell.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self { state }
    }

    /// Publishes `resolution` if the cell is still pending.
    ///
    /// Returns `false` if the cell had already been resolved; the earlier
    /// resolution is kept.
    pub fn resolve(&self, resolution: Resolution) -> bool {
        let mut resolution = Some(resolution);
        self.state.send_if_modified(|state| {
            if state.is_some() {
                return false;
            }
            *state = resolution.take();
            true
        })
    }

    /// Returns `true` once a resolution has been published.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.state.borrow().is_some()
    }

    /// Returns the resolution without waiting.
    #[must_use]
    pub fn peek(&self) -> Option<Resolution> {
        self.state.borrow().clone()
    }

    /// Waits for the resolution.
    ///
    /// Dropping the returned future only stops this waiter.
    pub async fn wait(&self) -> Resolution {
        let mut rx = self.state.subscribe();
        // A closed channel is unreachable while `self` holds the sender.
        let resolved = rx.wait_for(Option::is_some).await.ok().and_then(|state| state.clone());
        resolved.unwrap_or(Resolution::Failed(AuthError::ValidationAbandoned))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::time::Duration;

    use svcauth_storage::{BackendError, HashAlgorithm};

    use super::*;

    fn valid() -> Resolution {
        let verifier =
            Verifier::build(HashAlgorithm::Ssha256, &"super-secret-value".into()).expect("build");
        Resolution::Valid(Arc::new(verifier))
    }

    #[tokio::test]
    async fn test_resolve_once() {
        let cell = ResultCell::new();
        assert!(!cell.is_resolved());
        assert!(cell.peek().is_none());

        assert!(cell.resolve(Resolution::Invalid));
        assert!(!cell.resolve(valid()), "second resolution must be rejected");

        assert!(matches!(cell.wait().await, Resolution::Invalid));
        assert!(matches!(cell.peek(), Some(Resolution::Invalid)));
    }

    #[tokio::test]
    async fn test_waiters_all_see_resolution() {
        let cell = Arc::new(ResultCell::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cell = Arc::clone(&cell);
            handles.push(tokio::spawn(async move { cell.wait().await }));
        }
        tokio::task::yield_now().await;

        assert!(cell.resolve(valid()));

        for handle in handles {
            let resolution = handle.await.expect("waiter should not panic");
            let Resolution::Valid(verifier) = resolution else { panic!("expected valid") };
            assert!(verifier.matches(&"super-secret-value".into()));
        }
    }

    #[tokio::test]
    async fn test_failure_delivered_to_waiters() {
        let cell = Arc::new(ResultCell::new());
        let waiter = {
            let cell = Arc::clone(&cell);
            tokio::spawn(async move { cell.wait().await })
        };

        cell.resolve(Resolution::Failed(AuthError::Backend(BackendError::timeout())));

        let resolution = waiter.await.expect("waiter should not panic");
        assert!(matches!(
            resolution,
            Resolution::Failed(AuthError::Backend(BackendError::Timeout))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_waiter_does_not_affect_others() {
        let cell = Arc::new(ResultCell::new());

        let timed_out = tokio::time::timeout(Duration::from_millis(10), cell.wait()).await;
        assert!(timed_out.is_err());

        let waiter = {
            let cell = Arc::clone(&cell);
            tokio::spawn(async move { cell.wait().await })
        };
        cell.resolve(Resolution::Invalid);
        assert!(matches!(waiter.await.expect("join"), Resolution::Invalid));
    }
}
