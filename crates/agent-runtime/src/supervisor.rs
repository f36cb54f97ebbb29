//! Job body: resolve the agent's handle and process one event

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use job_queue::{Job, JobHandler};
use relay_core::event::FileEventStore;
use relay_core::logs::{LogLevel, LogPublisher, LogRecord, LogStore};

use crate::error::RuntimeError;
use crate::handle::HandleRegistry;

/// Worker-pool job body for agent event processing
///
/// Success marks the event processed before the job is acked; failure
/// propagates so the queue's retry policy takes over. Events already
/// marked processed are acked without re-running (idempotent
/// consumption after a crash between processing and ack).
pub struct RuntimeSupervisor {
    events: Arc<FileEventStore>,
    registry: Arc<HandleRegistry>,
    logs: Arc<LogStore>,
    publisher: Arc<LogPublisher>,
}

impl RuntimeSupervisor {
    pub fn new(
        events: Arc<FileEventStore>,
        registry: Arc<HandleRegistry>,
        logs: Arc<LogStore>,
        publisher: Arc<LogPublisher>,
    ) -> Self {
        Self {
            events,
            registry,
            logs,
            publisher,
        }
    }

    /// Append a log record durably, then fan out to live subscribers
    ///
    /// Log delivery is best-effort; a failed durable append is logged
    /// and never fails the job.
    async fn record(&self, record: LogRecord) {
        if let Err(err) = self.logs.append(&record).await {
            warn!("Failed to append log record: {}", err);
        }
        self.publisher.publish(record).await;
    }
}

#[async_trait]
impl JobHandler for RuntimeSupervisor {
    async fn handle(&self, job: &Job) -> anyhow::Result<()> {
        let event = self
            .events
            .get(job.event_id)
            .await?
            .ok_or(RuntimeError::EventNotFound(job.event_id))?;

        if event.is_processed() {
            info!(
                "Event {} already processed, acking job {}",
                event.id, job.job_id
            );
            return Ok(());
        }

        let handle = self.registry.get(&job.agent_id).await?;
        handle.process_event(&event).await?;

        self.events.mark_processed(event.id).await?;

        self.record(LogRecord::new(
            &job.agent_id,
            LogLevel::Info,
            format!(
                "Processed {} event {}",
                event.event_type.as_str(),
                event.id
            ),
        ))
        .await;

        Ok(())
    }
}
