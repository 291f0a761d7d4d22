use serde::{Deserialize, Serialize};

/// Behaviour switches for a [`crate::SettingsModel`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Save automatically once an edit leaves unsaved changes.
    pub auto_save: bool,
    /// Buffer size of the event channel. Slow subscribers lag past this.
    pub event_capacity: usize,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            auto_save: true,
            event_capacity: 64,
        }
    }
}
