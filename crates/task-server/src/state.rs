//! Application state

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::storage::{RemoteStorage, StorageConfig};

/// Server configuration read from the environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Command that runs the agent logic; the prompt is appended as
    /// its final argument
    pub agent_command: String,
    pub agent_args: Vec<String>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("TASK_SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("TASK_SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4000),
            agent_command: std::env::var("AGENT_COMMAND").unwrap_or_else(|_| "agent".to_string()),
            agent_args: Vec::new(),
        }
    }
}

/// Shared application state
///
/// The storage slot is written at startup (from the environment) and
/// by explicit storage payloads on task requests; each task snapshots
/// it at spawn time, so a mid-flight update never affects writes
/// already in transit.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    storage: RwLock<Option<Arc<RemoteStorage>>>,
}

impl AppState {
    pub async fn new(config: ServerConfig) -> Self {
        let storage = StorageConfig::from_env().map(|cfg| Arc::new(RemoteStorage::new(cfg)));
        Self {
            inner: Arc::new(AppStateInner {
                config,
                storage: RwLock::new(storage),
            }),
        }
    }

    /// Build a state with no storage configured (tests)
    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                storage: RwLock::new(None),
            }),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Snapshot the current storage client
    pub async fn storage(&self) -> Option<Arc<RemoteStorage>> {
        self.inner.storage.read().await.clone()
    }

    pub async fn storage_configured(&self) -> bool {
        self.inner.storage.read().await.is_some()
    }

    /// Replace the storage configuration
    pub async fn set_storage(&self, config: StorageConfig) {
        let mut slot = self.inner.storage.write().await;
        *slot = Some(Arc::new(RemoteStorage::new(config)));
    }
}
