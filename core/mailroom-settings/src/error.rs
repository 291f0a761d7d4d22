//! Error types for the settings layer.

use thiserror::Error;

/// Result type for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;

/// Errors that can occur while persisting settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The request never got a response.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("settings endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The endpoint accepted the request but refused the batch.
    #[error("batch rejected: {0}")]
    Rejected(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}
