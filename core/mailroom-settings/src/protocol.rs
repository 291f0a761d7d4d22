//! Wire format of the batches sent to the settings endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The unit of work sent to the settings endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchAction {
    /// Delete the listed paths.
    Delete,
    /// Store the listed path/value pairs.
    Set,
    /// Reset the listed paths to the server's own defaults.
    Reset,
}

impl BatchAction {
    /// Order in which a save issues its batches.
    pub const SAVE_ORDER: [BatchAction; 3] = [Self::Delete, Self::Set, Self::Reset];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Set => "set",
            Self::Reset => "reset",
        }
    }
}

impl fmt::Display for BatchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One path in a batch.
///
/// `value` is absent for deletes and resets, and for the object nodes a
/// nested `set` expands into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingEntry {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl SettingEntry {
    pub fn path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value: None,
        }
    }

    pub fn value(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            value: Some(value),
        }
    }
}

/// A single request to the settings endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub action: BatchAction,
    pub setting: Vec<SettingEntry>,
    /// Asks the server to have the client reload after applying.
    #[serde(default)]
    pub requires_reload: bool,
}

impl BatchRequest {
    pub fn new(action: BatchAction, setting: Vec<SettingEntry>) -> Self {
        Self {
            action,
            setting,
            requires_reload: false,
        }
    }

    pub fn with_reload(mut self, requires_reload: bool) -> Self {
        self.requires_reload = requires_reload;
        self
    }

    /// Paths touched by this batch, in order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.setting.iter().map(|e| e.path.as_str())
    }
}

/// Optional JSON body an endpoint may answer with.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BatchResponse {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

fn default_success() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_wire_shape() {
        let request = BatchRequest::new(
            BatchAction::Delete,
            vec![SettingEntry::path("a/b"), SettingEntry::path("a")],
        );
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "action": "delete",
                "setting": [{"path": "a/b"}, {"path": "a"}],
                "requires_reload": false
            })
        );
    }

    #[test]
    fn response_defaults_to_success() {
        let response: BatchResponse = serde_json::from_str("{}").unwrap();
        assert!(response.success);
        assert!(response.error.is_none());
    }

    #[test]
    fn save_order_is_delete_set_reset() {
        let names: Vec<&str> = BatchAction::SAVE_ORDER.iter().map(|a| a.as_str()).collect();
        assert_eq!(names, ["delete", "set", "reset"]);
    }
}
