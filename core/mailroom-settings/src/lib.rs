//! # Mailroom Settings
//!
//! A hierarchical settings store addressed by `/`-separated paths.
//!
//! Changes are tracked in pending queues and pushed to a
//! [`SettingsBackend`] as independent `delete`, `set` and `reset` batches.
//! A failed batch is reported through [`SettingsEvent::Exception`] and stays
//! queued for the next save; the local tree is never rolled back.

pub mod backend;
pub mod config;
pub mod error;
pub mod event;
pub mod http;
pub mod model;
pub mod path;
pub mod protocol;
mod queue;

pub use backend::SettingsBackend;
pub use config::SettingsConfig;
pub use error::{SettingsError, SettingsResult};
pub use event::SettingsEvent;
pub use http::{HttpBackendConfig, HttpSettingsBackend};
pub use model::SettingsModel;
pub use protocol::{BatchAction, BatchRequest, SettingEntry};
pub use queue::PendingSnapshot;
