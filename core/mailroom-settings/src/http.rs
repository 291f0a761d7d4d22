//! HTTP settings backend.
//!
//! Each batch is POSTed as JSON to `{base_url}/{endpoint}`.

use crate::backend::SettingsBackend;
use crate::error::{SettingsError, SettingsResult};
use crate::protocol::{BatchRequest, BatchResponse};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Where and how to reach the settings endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpBackendConfig {
    /// Server root, e.g. `https://mail.example.com/api`.
    pub base_url: String,
    /// Path below `base_url` that accepts batches.
    pub endpoint: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Sent as `Authorization: Bearer ...` when set.
    pub bearer_token: Option<String>,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            endpoint: "settings".to_string(),
            timeout_secs: 30,
            bearer_token: None,
        }
    }
}

impl HttpBackendConfig {
    /// Parses a config from JSON; absent keys keep their defaults.
    pub fn from_json(json: &str) -> SettingsResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> SettingsResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| SettingsError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// Full URL batches are posted to.
    pub fn url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.endpoint.trim_start_matches('/')
        )
    }
}

/// Sends settings batches over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSettingsBackend {
    config: HttpBackendConfig,
    url: String,
    client: Client,
}

impl HttpSettingsBackend {
    pub fn new(config: HttpBackendConfig) -> SettingsResult<Self> {
        if config.base_url.is_empty() {
            return Err(SettingsError::Config("base_url must not be empty".into()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SettingsError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            url: config.url(),
            config,
            client,
        })
    }

    pub fn config(&self) -> &HttpBackendConfig {
        &self.config
    }
}

#[async_trait]
impl SettingsBackend for HttpSettingsBackend {
    async fn execute(&self, request: &BatchRequest) -> SettingsResult<()> {
        debug!(
            "POST {} ({} batch, {} entries)",
            self.url,
            request.action,
            request.setting.len()
        );

        let mut builder = self.client.post(&self.url).json(request);
        if let Some(token) = &self.config.bearer_token {
            builder = builder.bearer_auth(token);
        }
        let response = builder.send().await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(SettingsError::Status {
                status: status.as_u16(),
                body,
            });
        }

        // An empty or non-JSON body is plain acceptance.
        if let Ok(verdict) = serde_json::from_str::<BatchResponse>(&body) {
            if !verdict.success {
                return Err(SettingsError::Rejected(
                    verdict.error.unwrap_or_else(|| "no reason given".into()),
                ));
            }
        }
        Ok(())
    }
}
