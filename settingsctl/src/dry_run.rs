//! A backend that keeps batches on the machine.

use async_trait::async_trait;
use mailroom_settings::{BatchRequest, SettingsBackend, SettingsResult};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Accepts every batch without sending it anywhere and remembers it for
/// printing. Clones share the recorded batches.
#[derive(Debug, Clone, Default)]
pub struct DryRunBackend {
    requests: Arc<Mutex<Vec<BatchRequest>>>,
}

impl DryRunBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Batches accepted so far, in the order they arrived.
    pub fn requests(&self) -> Vec<BatchRequest> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<BatchRequest>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SettingsBackend for DryRunBackend {
    async fn execute(&self, request: &BatchRequest) -> SettingsResult<()> {
        debug!("dry run: keeping {} batch", request.action);
        self.lock().push(request.clone());
        Ok(())
    }
}
