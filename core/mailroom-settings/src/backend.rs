//! Backend abstraction.
//!
//! The model hands each batch to a [`SettingsBackend`]; how it reaches the
//! server is up to the implementation.

use crate::error::SettingsResult;
use crate::protocol::BatchRequest;
use async_trait::async_trait;

/// Delivers settings batches to wherever settings are stored.
#[async_trait]
pub trait SettingsBackend: Send + Sync {
    /// Sends one batch and waits for the verdict.
    async fn execute(&self, request: &BatchRequest) -> SettingsResult<()>;
}

/// A recording backend for testing.
pub mod mock {
    use super::*;
    use crate::error::SettingsError;
    use crate::protocol::BatchAction;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tokio::sync::Semaphore;

    #[derive(Debug, Default)]
    struct Inner {
        requests: Vec<BatchRequest>,
        /// Remaining failures per action; `None` fails forever.
        failures: HashMap<BatchAction, Option<usize>>,
    }

    /// Records every batch it receives and answers according to its setup.
    ///
    /// Cloning shares the underlying state, so a test can keep a handle
    /// while the model owns another.
    #[derive(Debug, Clone, Default)]
    pub struct MockBackend {
        inner: Arc<Mutex<Inner>>,
        gate: Option<Arc<Semaphore>>,
    }

    impl MockBackend {
        /// Creates a backend that accepts everything.
        pub fn new() -> Self {
            Self::default()
        }

        /// Creates a backend that holds each request until [`Self::open`]
        /// lets it through.
        pub fn gated() -> Self {
            Self {
                inner: Arc::default(),
                gate: Some(Arc::new(Semaphore::new(0))),
            }
        }

        /// Lets `n` held requests complete.
        pub fn open(&self, n: usize) {
            if let Some(gate) = &self.gate {
                gate.add_permits(n);
            }
        }

        /// Fails every batch of `action` from now on.
        pub fn fail(&self, action: BatchAction) {
            self.inner.lock().unwrap().failures.insert(action, None);
        }

        /// Fails the next `times` batches of `action`.
        pub fn fail_times(&self, action: BatchAction, times: usize) {
            self.inner
                .lock()
                .unwrap()
                .failures
                .insert(action, Some(times));
        }

        /// Stops failing.
        pub fn heal(&self) {
            self.inner.lock().unwrap().failures.clear();
        }

        /// Every batch received so far, in arrival order.
        pub fn requests(&self) -> Vec<BatchRequest> {
            self.inner.lock().unwrap().requests.clone()
        }

        /// Batches received for `action`.
        pub fn requests_for(&self, action: BatchAction) -> Vec<BatchRequest> {
            self.requests()
                .into_iter()
                .filter(|r| r.action == action)
                .collect()
        }

        pub fn request_count(&self) -> usize {
            self.inner.lock().unwrap().requests.len()
        }

        fn should_fail(&self, action: BatchAction) -> bool {
            let mut inner = self.inner.lock().unwrap();
            match inner.failures.get_mut(&action) {
                None => false,
                Some(None) => true,
                Some(Some(0)) => false,
                Some(Some(remaining)) => {
                    *remaining -= 1;
                    true
                }
            }
        }
    }

    #[async_trait]
    impl SettingsBackend for MockBackend {
        async fn execute(&self, request: &BatchRequest) -> SettingsResult<()> {
            self.inner.lock().unwrap().requests.push(request.clone());

            if let Some(gate) = &self.gate {
                let permit = gate
                    .acquire()
                    .await
                    .map_err(|e| SettingsError::Rejected(e.to_string()))?;
                permit.forget();
            }

            if self.should_fail(request.action) {
                return Err(SettingsError::Rejected(format!(
                    "mock refused {} batch",
                    request.action
                )));
            }
            Ok(())
        }
    }
}
