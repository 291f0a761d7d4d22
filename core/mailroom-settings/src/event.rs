//! Notifications broadcast by the settings model.

use crate::protocol::{BatchAction, SettingEntry};

/// Something observers of the settings may care about.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsEvent {
    /// Values were written locally (by `set` or `restore`).
    Set { settings: Vec<SettingEntry> },
    /// Paths were removed locally.
    Remove { paths: Vec<String> },
    /// A batch is about to be sent.
    BeforeSave {
        action: BatchAction,
        settings: Vec<SettingEntry>,
    },
    /// The endpoint confirmed a batch.
    Save {
        action: BatchAction,
        settings: Vec<SettingEntry>,
    },
    /// A batch failed; its entries are queued again.
    Exception {
        action: BatchAction,
        settings: Vec<SettingEntry>,
        message: String,
    },
}

impl SettingsEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Set { .. } => "set",
            Self::Remove { .. } => "remove",
            Self::BeforeSave { .. } => "beforesave",
            Self::Save { .. } => "save",
            Self::Exception { .. } => "exception",
        }
    }
}
