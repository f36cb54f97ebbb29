//! Read-through/write-through decorator over a cache and a durable store

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::cache::Cache;
use crate::Result;

/// Authoritative durable key/value store
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;

    async fn put(&self, key: &str, value: serde_json::Value) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<bool>;
}

/// Two-tier store: cache-aside reads, write-through writes
///
/// The durable store is the source of truth. Cache failures are logged
/// and ignored on both paths; a reader may observe a value up to one
/// TTL window stale relative to the latest durable write.
pub struct TieredStore {
    cache: Arc<dyn Cache>,
    durable: Arc<dyn DurableStore>,
    ttl: Duration,
}

impl TieredStore {
    pub fn new(cache: Arc<dyn Cache>, durable: Arc<dyn DurableStore>, ttl: Duration) -> Self {
        Self {
            cache,
            durable,
            ttl,
        }
    }

    /// Read a value: cache first, durable store on miss
    ///
    /// A durable hit repopulates the cache best-effort.
    pub async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        match self.cache.get(key).await {
            Ok(Some(value)) => return Ok(Some(value)),
            Ok(None) => {}
            Err(err) => warn!("Cache read failed for {}: {}", key, err),
        }

        let Some(value) = self.durable.get(key).await? else {
            return Ok(None);
        };

        if let Err(err) = self.cache.set(key, value.clone(), self.ttl).await {
            warn!("Cache repopulation failed for {}: {}", key, err);
        }

        Ok(Some(value))
    }

    /// Write a value to both tiers
    ///
    /// The durable write is authoritative and its failure is the
    /// caller's error; the cache write is an optimization only.
    pub async fn save(&self, key: &str, value: serde_json::Value) -> Result<()> {
        self.durable.put(key, value.clone()).await?;

        if let Err(err) = self.cache.set(key, value, self.ttl).await {
            warn!("Cache write failed for {}: {}", key, err);
        }

        Ok(())
    }

    /// Remove a value from both tiers
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let removed = self.durable.delete(key).await?;
        if let Err(err) = self.cache.delete(key).await {
            warn!("Cache delete failed for {}: {}", key, err);
        }
        Ok(removed)
    }
}
