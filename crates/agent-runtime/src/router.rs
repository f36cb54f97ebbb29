//! Event ingestion: durable record first, then enqueue

use std::sync::Arc;

use tracing::info;

use job_queue::{Job, JobQueue};
use relay_core::event::{Event, EventType, FileEventStore};

use crate::error::{Result, RuntimeError};

/// Records an incoming event and hands it to the job queue
///
/// The event is persisted before the job is enqueued, so a job never
/// exists without a backing record. If enqueue fails after the persist
/// succeeded, the event stays recorded with `processed_at` unset;
/// replaying it is an operational concern, not retried here.
pub struct EventRouter {
    events: Arc<FileEventStore>,
    queue: Arc<JobQueue>,
}

impl EventRouter {
    pub fn new(events: Arc<FileEventStore>, queue: Arc<JobQueue>) -> Self {
        Self { events, queue }
    }

    /// Validate, record, and enqueue one event
    pub async fn route_event(
        &self,
        agent_id: &str,
        event_type: EventType,
        payload: serde_json::Value,
    ) -> Result<Event> {
        if agent_id.trim().is_empty() {
            return Err(RuntimeError::InvalidPayload(
                "agentId must not be empty".to_string(),
            ));
        }
        if !payload.is_object() {
            return Err(RuntimeError::InvalidPayload(
                "payload must be a JSON object".to_string(),
            ));
        }

        let event = self
            .events
            .create(Event::new(agent_id, event_type, payload.clone()))
            .await?;

        let job = Job::new(agent_id, event.id, event_type, payload);
        self.queue.enqueue(job).await?;

        info!(
            "Routed {} event {} for agent {}",
            event_type.as_str(),
            event.id,
            agent_id
        );
        Ok(event)
    }
}
