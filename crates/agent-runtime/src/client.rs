//! HTTP client for the container execution server

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, RuntimeError};

/// Task request sent to the container execution server
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteTaskRequest {
    pub agent_id: String,
    pub session_id: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteTaskResponse {
    success: bool,
    #[allow(dead_code)]
    status: Option<String>,
    error: Option<String>,
}

/// Client surface for dispatching one task, swappable in tests
#[async_trait]
pub trait TaskApi: Send + Sync {
    /// Dispatch a task; returns once the server has accepted it
    async fn execute(&self, request: &ExecuteTaskRequest) -> Result<()>;
}

/// Reqwest-backed task client
pub struct HttpTaskClient {
    client: Client,
    url: String,
}

impl HttpTaskClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            // Disable proxy for internal runtime communication
            client: Client::builder()
                .no_proxy()
                .build()
                .unwrap_or_else(|_| Client::new()),
            url: url.into(),
        }
    }
}

#[async_trait]
impl TaskApi for HttpTaskClient {
    async fn execute(&self, request: &ExecuteTaskRequest) -> Result<()> {
        info!(
            "Dispatching task for agent {} session {} to {}/execute",
            request.agent_id, request.session_id, self.url
        );

        let res = self
            .client
            .post(format!("{}/execute", self.url))
            .json(request)
            .send()
            .await
            .map_err(|e| RuntimeError::TaskRequest(format!("Failed to reach runtime: {}", e)))?;

        if !res.status().is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(RuntimeError::TaskRequest(format!(
                "Runtime rejected task: {}",
                body
            )));
        }

        let ack: ExecuteTaskResponse = res
            .json()
            .await
            .map_err(|e| RuntimeError::TaskRequest(format!("Malformed runtime response: {}", e)))?;

        if !ack.success {
            return Err(RuntimeError::TaskRequest(
                ack.error.unwrap_or_else(|| "Unknown runtime error".to_string()),
            ));
        }

        Ok(())
    }
}
