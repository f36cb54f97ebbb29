//! File-based event storage
//!
//! Stores events as JSON in a file on disk. Events are never deleted;
//! the only mutation is setting `processed_at`, at most once.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::model::Event;
use crate::{Error, Result};

/// File-based event store using JSON
pub struct FileEventStore {
    /// Path to the JSON file
    path: PathBuf,
    /// In-memory copy of the event table
    events: RwLock<HashMap<Uuid, Event>>,
}

impl FileEventStore {
    /// Create a new FileEventStore
    ///
    /// If the file doesn't exist, it will be created on first write.
    pub async fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let events = if path.exists() {
            let content = tokio::fs::read_to_string(&path).await?;
            let records: Vec<Event> = serde_json::from_str(&content)?;
            records.into_iter().map(|e| (e.id, e)).collect()
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            events: RwLock::new(events),
        })
    }

    /// Persist the event table to disk
    async fn persist(&self) -> Result<()> {
        let events = self.events.read().await;
        let records: Vec<&Event> = events.values().collect();
        let content = serde_json::to_string_pretty(&records)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }

    /// Record a new event
    pub async fn create(&self, event: Event) -> Result<Event> {
        {
            let mut events = self.events.write().await;
            if events.contains_key(&event.id) {
                return Err(Error::InvalidInput(format!(
                    "Event with ID {} already exists",
                    event.id
                )));
            }
            events.insert(event.id, event.clone());
        }
        self.persist().await?;
        Ok(event)
    }

    /// Get an event by ID
    pub async fn get(&self, id: Uuid) -> Result<Option<Event>> {
        let events = self.events.read().await;
        Ok(events.get(&id).cloned())
    }

    /// Mark an event as processed
    ///
    /// Setting `processed_at` is monotonic: if it is already set, the
    /// stored record is returned unchanged.
    pub async fn mark_processed(&self, id: Uuid) -> Result<Event> {
        let (event, changed) = {
            let mut events = self.events.write().await;
            let event = events
                .get_mut(&id)
                .ok_or_else(|| Error::EventNotFound(id.to_string()))?;

            if event.processed_at.is_some() {
                (event.clone(), false)
            } else {
                event.processed_at = Some(Utc::now());
                (event.clone(), true)
            }
        };

        if changed {
            self.persist().await?;
        }
        Ok(event)
    }

    /// List events for an agent, newest first
    pub async fn list_for_agent(&self, agent_id: &str) -> Result<Vec<Event>> {
        let events = self.events.read().await;
        let mut records: Vec<Event> = events
            .values()
            .filter(|e| e.agent_id == agent_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    /// List events that have not been processed yet, oldest first
    pub async fn list_unprocessed(&self) -> Result<Vec<Event>> {
        let events = self.events.read().await;
        let mut records: Vec<Event> = events
            .values()
            .filter(|e| !e.is_processed())
            .cloned()
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }
}
