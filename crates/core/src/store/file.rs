//! File-based durable key/value store
//!
//! Stores the whole key space as a JSON object in one file, rewritten
//! on every mutation.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use super::tiered::DurableStore;
use crate::Result;

/// File-backed durable store using JSON
pub struct FileStore {
    /// Path to the JSON file
    path: PathBuf,
    /// In-memory copy of the key space
    entries: RwLock<HashMap<String, serde_json::Value>>,
    /// Serializes mutation + persist, so a persist never writes a
    /// snapshot older than one already on disk
    persist_lock: Mutex<()>,
}

impl FileStore {
    /// Create a new FileStore
    ///
    /// If the file doesn't exist, it will be created on first write.
    pub async fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = tokio::fs::read_to_string(&path).await?;
            serde_json::from_str(&content)?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
            persist_lock: Mutex::new(()),
        })
    }

    async fn persist(&self) -> Result<()> {
        let entries = self.entries.read().await;
        let content = serde_json::to_string_pretty(&*entries)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }
}

#[async_trait]
impl DurableStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let _guard = self.persist_lock.lock().await;
        {
            let mut entries = self.entries.write().await;
            entries.insert(key.to_string(), value);
        }
        self.persist().await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let _guard = self.persist_lock.lock().await;
        let removed = {
            let mut entries = self.entries.write().await;
            entries.remove(key).is_some()
        };
        if removed {
            self.persist().await?;
        }
        Ok(removed)
    }
}
