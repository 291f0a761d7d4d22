//! The settings model.
//!
//! Holds the live settings tree next to the defaults it was seeded from,
//! tracks what changed, and pushes the changes to a [`SettingsBackend`] in
//! batches. Writes inside a `begin_edit`/`end_edit` pair are flushed once,
//! when the outermost transaction ends.

use crate::backend::SettingsBackend;
use crate::config::SettingsConfig;
use crate::event::SettingsEvent;
use crate::path;
use crate::protocol::{BatchAction, SettingEntry};
use crate::queue::{OutgoingBatch, PendingChanges, PendingSnapshot};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

fn lock(pending: &Mutex<PendingChanges>) -> MutexGuard<'_, PendingChanges> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Hierarchical settings with queued, batched persistence.
pub struct SettingsModel {
    config: SettingsConfig,
    defaults: Value,
    settings: Value,
    pending: Arc<Mutex<PendingChanges>>,
    editing_depth: usize,
    backend: Arc<dyn SettingsBackend>,
    events: broadcast::Sender<SettingsEvent>,
    in_flight: Vec<JoinHandle<()>>,
}

impl SettingsModel {
    /// Creates a model whose settings start out equal to `defaults`.
    pub fn new(config: SettingsConfig, defaults: Value, backend: Arc<dyn SettingsBackend>) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            config,
            settings: defaults.clone(),
            defaults,
            pending: Arc::default(),
            editing_depth: 0,
            backend,
            events,
            in_flight: Vec::new(),
        }
    }

    /// Replaces the live tree with `tree` merged over the defaults.
    pub fn initialize(&mut self, tree: &Value) {
        self.settings = path::merge(&self.defaults, tree);
    }

    pub fn config(&self) -> &SettingsConfig {
        &self.config
    }

    /// The whole live tree.
    pub fn settings(&self) -> &Value {
        &self.settings
    }

    pub fn defaults(&self) -> &Value {
        &self.defaults
    }

    /// Reads `path`. Sub-trees are only returned when `raw` is set; without
    /// it an object at `path` reads as `None`.
    pub fn get_with(&self, path: &str, raw: bool, use_defaults: bool) -> Option<Value> {
        let tree = if use_defaults { &self.defaults } else { &self.settings };
        match path::lookup(tree, path::normalize(path))? {
            Value::Object(_) if !raw => None,
            value => Some(value.clone()),
        }
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        self.get_with(path, false, false)
    }

    pub fn get_raw(&self, path: &str) -> Option<Value> {
        self.get_with(path, true, false)
    }

    pub fn get_default(&self, path: &str) -> Option<Value> {
        self.get_with(path, false, true)
    }

    pub fn get_default_raw(&self, path: &str) -> Option<Value> {
        self.get_with(path, true, true)
    }

    /// Writes `value` at `path`, replacing whatever sub-tree was there.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) {
        let path = path::normalize(path);
        if path.is_empty() {
            warn!("ignoring set on the settings root");
            return;
        }
        let value = value.into();
        if path::lookup(&self.settings, path) == Some(&value) {
            return;
        }

        let removed = path::remove(&mut self.settings, path);
        let written = path::apply(&mut self.settings, path, value);
        {
            let mut pending = lock(&self.pending);
            pending.push_deleted(removed);
            pending.push_modified(written);
        }
        self.changed();
    }

    /// Removes the sub-tree at `path`.
    pub fn remove(&mut self, path: &str) {
        let path = path::normalize(path);
        let removed = path::remove(&mut self.settings, path);
        if removed.is_empty() {
            return;
        }
        lock(&self.pending).push_deleted(removed);
        self.changed();
    }

    /// Puts the default sub-tree back at `path`.
    ///
    /// A restore is only broadcast, never saved by itself. When `path` has
    /// no default it is restored as a value-less entry. Removed sub-paths
    /// the defaults lack stay deleted and are saved as such.
    pub fn restore(&mut self, path: &str) {
        let path = path::normalize(path);
        if path.is_empty() {
            warn!("ignoring restore of the settings root");
            return;
        }
        let removed = path::remove(&mut self.settings, path);
        let restored = match path::lookup(&self.defaults, path) {
            Some(default) => path::apply(&mut self.settings, path, default.clone()),
            None => vec![SettingEntry::path(path)],
        };
        {
            let mut pending = lock(&self.pending);
            pending.push_deleted(removed);
            pending.push_restored(restored);
        }
        self.changed();
    }

    /// Asks the server to reset `path` to its own default on the next save.
    pub fn reset(&mut self, path: &str) {
        let path = path::normalize(path);
        if path.is_empty() {
            return;
        }
        lock(&self.pending).push_reset(path);
    }

    /// Flags outgoing batches as requiring a client reload.
    pub fn set_requires_reload(&mut self, requires_reload: bool) {
        lock(&self.pending).set_requires_reload(requires_reload);
    }

    pub fn begin_edit(&mut self) {
        self.editing_depth += 1;
    }

    /// Closes a transaction. An unmatched call does nothing.
    pub fn end_edit(&mut self) {
        if self.editing_depth == 0 {
            return;
        }
        self.editing_depth -= 1;
        if self.editing_depth == 0 && !lock(&self.pending).is_empty() {
            self.after_edit();
        }
    }

    pub fn is_editing(&self) -> bool {
        self.editing_depth > 0
    }

    pub fn editing_depth(&self) -> usize {
        self.editing_depth
    }

    fn changed(&mut self) {
        if self.editing_depth == 0 {
            self.after_edit();
        }
    }

    fn after_edit(&mut self) {
        let (restored, modified, deleted, unsaved) = {
            let mut pending = lock(&self.pending);
            (
                pending.take_restored(),
                pending.announce_modified(),
                pending.announce_deleted(),
                pending.has_unsaved(),
            )
        };

        if !restored.is_empty() {
            self.emit(SettingsEvent::Set { settings: restored });
        }
        if !modified.is_empty() {
            self.emit(SettingsEvent::Set { settings: modified });
        }
        if !deleted.is_empty() {
            self.emit(SettingsEvent::Remove { paths: deleted });
        }
        if unsaved && self.config.auto_save {
            self.save();
        }
    }

    fn emit(&self, event: SettingsEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Sends one batch per non-empty queue, in the order delete, set, reset.
    /// Returns the number of batches issued.
    ///
    /// Must be called from within a Tokio runtime; otherwise nothing is sent
    /// and the changes stay queued.
    pub fn save(&mut self) -> usize {
        let Ok(runtime) = Handle::try_current() else {
            warn!("no async runtime available, settings stay queued");
            return 0;
        };
        self.in_flight.retain(|task| !task.is_finished());

        let mut issued = 0;
        for action in BatchAction::SAVE_ORDER {
            let batch = lock(&self.pending).begin_batch(action);
            let Some(batch) = batch else {
                continue;
            };

            debug!(
                "issuing {} batch with {} entries",
                action,
                batch.request.setting.len()
            );
            self.emit(SettingsEvent::BeforeSave {
                action,
                settings: batch.request.setting.clone(),
            });

            let task = run_batch(
                Arc::clone(&self.backend),
                Arc::clone(&self.pending),
                self.events.clone(),
                batch,
            );
            self.in_flight.push(runtime.spawn(task));
            issued += 1;
        }
        issued
    }

    /// Waits until every issued batch has been answered.
    pub async fn wait_idle(&mut self) {
        for task in self.in_flight.drain(..) {
            if let Err(e) = task.await {
                warn!("settings batch task failed: {e}");
            }
        }
    }

    /// What is still waiting for confirmation.
    pub fn pending(&self) -> PendingSnapshot {
        lock(&self.pending).snapshot()
    }

    /// Number of queued entries currently part of an unanswered batch.
    pub fn in_flight_count(&self) -> usize {
        lock(&self.pending).in_flight_count()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SettingsEvent> {
        self.events.subscribe()
    }
}

async fn run_batch(
    backend: Arc<dyn SettingsBackend>,
    pending: Arc<Mutex<PendingChanges>>,
    events: broadcast::Sender<SettingsEvent>,
    batch: OutgoingBatch,
) {
    let OutgoingBatch { request, seqs } = batch;
    let action = request.action;

    match backend.execute(&request).await {
        Ok(()) => {
            lock(&pending).commit(action, &seqs);
            info!("saved {} batch ({} entries)", action, seqs.len());
            let _ = events.send(SettingsEvent::Save {
                action,
                settings: request.setting,
            });
        }
        Err(e) => {
            lock(&pending).release(action, &seqs);
            warn!("{} batch failed: {e}", action);
            let _ = events.send(SettingsEvent::Exception {
                action,
                settings: request.setting,
                message: e.to_string(),
            });
        }
    }
}
