//! Volatile TTL cache tier

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::Result;

/// Volatile key/value cache with per-entry TTL
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;

    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// In-process cache backed by a map of value + expiry instant
///
/// Expired entries are dropped lazily on access.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, (serde_json::Value, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries, for tests and diagnostics
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries.values().filter(|(_, expiry)| *expiry > now).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some((value, expiry)) if *expiry > Instant::now() => {
                    return Ok(Some(value.clone()))
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Entry exists but is expired; remove it.
        let mut entries = self.entries.write().await;
        if let Some((_, expiry)) = entries.get(key) {
            if *expiry <= Instant::now() {
                entries.remove(key);
            }
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }
}
