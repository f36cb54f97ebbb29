//! Best-effort broadcast of log records to live subscribers
//!
//! Each agent gets its own topic; publishing never fails the caller.
//! The durable append (see `LogStore`) happens before publish is
//! attempted.

use std::collections::HashMap;

use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::model::LogRecord;

const TOPIC_CAPACITY: usize = 256;

/// Topic name for one agent's log stream
pub fn log_topic(agent_id: &str) -> String {
    format!("agent:{}:logs", agent_id)
}

/// Fan-out of freshly persisted log records
///
/// Constructed once at process startup and passed to consumers; there
/// is no lazy global instance.
#[derive(Default)]
pub struct LogPublisher {
    topics: RwLock<HashMap<String, broadcast::Sender<LogRecord>>>,
}

impl LogPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a record on its agent's topic
    ///
    /// Delivery is best-effort: no subscribers, or subscribers that
    /// have lagged past the channel capacity, are not errors.
    pub async fn publish(&self, record: LogRecord) {
        let topic = log_topic(&record.agent_id);
        let topics = self.topics.read().await;

        if let Some(sender) = topics.get(&topic) {
            match sender.send(record) {
                Ok(delivered) => debug!("Published log to {} ({} subscribers)", topic, delivered),
                Err(_) => debug!("No live subscribers on {}", topic),
            }
        }
    }

    /// Subscribe to one agent's log stream
    pub async fn subscribe(&self, agent_id: &str) -> broadcast::Receiver<LogRecord> {
        let topic = log_topic(agent_id);

        {
            let topics = self.topics.read().await;
            if let Some(sender) = topics.get(&topic) {
                return sender.subscribe();
            }
        }

        let mut topics = self.topics.write().await;
        topics
            .entry(topic)
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe()
    }
}
