//! Remote storage client
//!
//! Key/value writes over HTTP: `PUT {base}/kv/{key}` replaces a slot,
//! `POST {base}/kv/{key}/append` appends a chunk. Callers treat every
//! write as independent; a failed write is logged and the next one is
//! attempted regardless.

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Storage returned status {0}")]
    Status(reqwest::StatusCode),
}

/// Storage configuration carried on a task request or seeded from env
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    pub api_url: String,
    #[serde(default)]
    pub token: Option<String>,
}

impl StorageConfig {
    pub fn from_env() -> Option<Self> {
        let api_url = std::env::var("STORAGE_API_URL").ok()?;
        Some(Self {
            api_url,
            token: std::env::var("STORAGE_API_TOKEN").ok(),
        })
    }
}

/// Keys for one task's output slots
#[derive(Debug, Clone)]
pub struct StorageKeys {
    pub output: String,
    pub stderr: String,
    pub status: String,
    pub error: String,
}

impl StorageKeys {
    pub fn new(agent_id: &str, session_id: &str) -> Self {
        let prefix = format!("agent:{}:session:{}", agent_id, session_id);
        Self {
            output: format!("{}:output", prefix),
            stderr: format!("{}:stderr", prefix),
            status: format!("{}:status", prefix),
            error: format!("{}:error", prefix),
        }
    }
}

/// HTTP client for the remote key/value storage
pub struct RemoteStorage {
    client: Client,
    config: StorageConfig,
}

impl RemoteStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            // Disable proxy for in-cluster storage traffic
            client: Client::builder()
                .no_proxy()
                .build()
                .unwrap_or_else(|_| Client::new()),
            config,
        }
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, url);
        if let Some(token) = &self.config.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Replace the value at a key
    pub async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let url = format!("{}/kv/{}", self.config.api_url, key);
        let res = self
            .request(reqwest::Method::PUT, url)
            .body(value.to_string())
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(StorageError::Status(res.status()));
        }
        Ok(())
    }

    /// Append a chunk to a key
    pub async fn append(&self, key: &str, chunk: Vec<u8>) -> Result<(), StorageError> {
        let url = format!("{}/kv/{}/append", self.config.api_url, key);
        let res = self
            .request(reqwest::Method::POST, url)
            .body(chunk)
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(StorageError::Status(res.status()));
        }
        Ok(())
    }

    /// Write a value, logging and swallowing any failure
    pub async fn set_logged(&self, key: &str, value: &str) {
        if let Err(err) = self.set(key, value).await {
            warn!("Storage write to {} failed: {}", key, err);
        }
    }

    /// Append a chunk, logging and swallowing any failure
    pub async fn append_logged(&self, key: &str, chunk: Vec<u8>) {
        if let Err(err) = self.append(key, chunk).await {
            warn!("Storage append to {} failed: {}", key, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_keys_layout() {
        let keys = StorageKeys::new("a1", "s1");
        assert_eq!(keys.output, "agent:a1:session:s1:output");
        assert_eq!(keys.stderr, "agent:a1:session:s1:stderr");
        assert_eq!(keys.status, "agent:a1:session:s1:status");
        assert_eq!(keys.error, "agent:a1:session:s1:error");
    }

    #[test]
    fn test_storage_config_from_json() {
        let config: StorageConfig =
            serde_json::from_value(serde_json::json!({"apiUrl": "http://s", "token": "t"}))
                .unwrap();
        assert_eq!(config.api_url, "http://s");
        assert_eq!(config.token.as_deref(), Some("t"));
    }
}
