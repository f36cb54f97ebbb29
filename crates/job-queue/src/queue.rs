//! Queue state, persistence, and retry policy
//!
//! State is a single JSON file rewritten on mutation. In-flight jobs
//! found at startup are recovered as pending, which preserves
//! at-least-once delivery across restarts.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use relay_core::event::EventType;

use crate::error::{QueueError, Result};

/// One unit of work referencing a recorded event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: Uuid,
    pub agent_id: String,
    pub event_id: Uuid,
    pub event_type: EventType,
    pub payload: serde_json::Value,
    /// Delivery attempts so far
    pub attempts: u32,
}

impl Job {
    pub fn new(
        agent_id: impl Into<String>,
        event_id: Uuid,
        event_type: EventType,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            agent_id: agent_id.into(),
            event_id,
            event_type,
            payload,
            attempts: 0,
        }
    }
}

/// Queue tuning knobs
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Deliveries before a job is moved to the failed set
    pub max_attempts: u32,
    /// First retry delay; doubles per attempt, with ±50% jitter
    pub base_delay: Duration,
    /// Completed jobs retained for inspection
    pub retention_completed: usize,
    /// Failed jobs retained, oldest evicted first
    pub retention_failed: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            retention_completed: 100,
            retention_failed: 50,
        }
    }
}

/// A job scheduled for redelivery after a backoff window
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DelayedJob {
    ready_at: DateTime<Utc>,
    job: Job,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct QueueState {
    pending: VecDeque<Job>,
    delayed: Vec<DelayedJob>,
    in_flight: HashMap<Uuid, Job>,
    completed: VecDeque<Job>,
    failed: VecDeque<Job>,
}

impl QueueState {
    /// Move delayed jobs whose backoff has elapsed into pending
    fn promote_due(&mut self) {
        let now = Utc::now();
        let mut remaining = Vec::with_capacity(self.delayed.len());
        for delayed in self.delayed.drain(..) {
            if delayed.ready_at <= now {
                self.pending.push_back(delayed.job);
            } else {
                remaining.push(delayed);
            }
        }
        self.delayed = remaining;
    }

    /// Duration until the next delayed job becomes due
    fn next_due_in(&self) -> Option<Duration> {
        let now = Utc::now();
        self.delayed
            .iter()
            .map(|d| (d.ready_at - now).to_std().unwrap_or(Duration::ZERO))
            .min()
    }
}

/// Durable at-least-once work queue
pub struct JobQueue {
    path: PathBuf,
    config: QueueConfig,
    state: RwLock<QueueState>,
    notify: Notify,
}

impl JobQueue {
    /// Open (or create) a queue persisted at `path`
    ///
    /// Jobs that were in flight when the previous process died are
    /// recovered as pending.
    pub async fn new(path: impl Into<PathBuf>, config: QueueConfig) -> Result<Self> {
        let path = path.into();
        let mut state: QueueState = if path.exists() {
            let content = tokio::fs::read_to_string(&path).await?;
            serde_json::from_str(&content)?
        } else {
            QueueState::default()
        };

        let orphaned: Vec<Job> = state.in_flight.drain().map(|(_, job)| job).collect();
        if !orphaned.is_empty() {
            warn!("Recovering {} in-flight jobs as pending", orphaned.len());
            state.pending.extend(orphaned);
        }

        Ok(Self {
            path,
            config,
            state: RwLock::new(state),
            notify: Notify::new(),
        })
    }

    async fn persist(&self) -> Result<()> {
        let state = self.state.read().await;
        let content = serde_json::to_string_pretty(&*state)?;
        drop(state);

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }

    /// Add a job to the back of the queue
    pub async fn enqueue(&self, job: Job) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state.pending.push_back(job);
        }
        self.persist().await?;
        self.notify.notify_one();
        Ok(())
    }

    /// Take the next job, waiting until one is available
    ///
    /// The returned job is in flight until `ack` or `nack`.
    pub async fn dequeue(&self) -> Result<Job> {
        loop {
            let (job, wait) = {
                let mut state = self.state.write().await;
                state.promote_due();

                if let Some(mut job) = state.pending.pop_front() {
                    job.attempts += 1;
                    state.in_flight.insert(job.job_id, job.clone());
                    (Some(job), None)
                } else {
                    (None, state.next_due_in())
                }
            };

            if let Some(job) = job {
                self.persist().await?;
                return Ok(job);
            }

            match wait {
                Some(delay) => {
                    tokio::select! {
                        _ = self.notify.notified() => {}
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                None => self.notify.notified().await,
            }
        }
    }

    /// Acknowledge successful completion of an in-flight job
    pub async fn ack(&self, job_id: Uuid) -> Result<()> {
        {
            let mut state = self.state.write().await;
            let job = state
                .in_flight
                .remove(&job_id)
                .ok_or(QueueError::JobNotInFlight(job_id))?;

            state.completed.push_back(job);
            while state.completed.len() > self.config.retention_completed {
                state.completed.pop_front();
            }
        }
        self.persist().await
    }

    /// Report failure of an in-flight job
    ///
    /// The job is redelivered after a backoff window until the attempt
    /// budget is exhausted, then moved to the bounded failed set.
    pub async fn nack(&self, job_id: Uuid) -> Result<()> {
        let notify = {
            let mut state = self.state.write().await;
            let job = state
                .in_flight
                .remove(&job_id)
                .ok_or(QueueError::JobNotInFlight(job_id))?;

            if job.attempts >= self.config.max_attempts {
                debug!(
                    "Job {} exhausted {} attempts, moving to failed set",
                    job.job_id, job.attempts
                );
                state.failed.push_back(job);
                while state.failed.len() > self.config.retention_failed {
                    state.failed.pop_front();
                }
                false
            } else {
                let delay = self.backoff_delay(job.attempts);
                debug!(
                    "Job {} attempt {} failed, retrying in {:?}",
                    job.job_id, job.attempts, delay
                );
                state.delayed.push(DelayedJob {
                    ready_at: Utc::now()
                        + chrono::Duration::from_std(delay)
                            .unwrap_or_else(|_| chrono::Duration::seconds(2)),
                    job,
                });
                true
            }
        };

        self.persist().await?;
        if notify {
            self.notify.notify_one();
        }
        Ok(())
    }

    /// Exponential backoff with ±50% jitter
    fn backoff_delay(&self, attempts: u32) -> Duration {
        let base = self.config.base_delay.as_millis() as u64;
        let exp = base.saturating_mul(1u64 << attempts.saturating_sub(1).min(10));
        let jitter = rand::thread_rng().gen_range(0.5..1.5);
        Duration::from_millis((exp as f64 * jitter) as u64)
    }

    /// Jobs waiting for delivery (pending + delayed)
    pub async fn backlog(&self) -> usize {
        let state = self.state.read().await;
        state.pending.len() + state.delayed.len()
    }

    /// Snapshot of the failed set, oldest first
    pub async fn failed_jobs(&self) -> Vec<Job> {
        let state = self.state.read().await;
        state.failed.iter().cloned().collect()
    }

    /// Snapshot of the completed set, oldest first
    pub async fn completed_jobs(&self) -> Vec<Job> {
        let state = self.state.read().await;
        state.completed.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fast_config() -> QueueConfig {
        QueueConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(5),
            retention_completed: 3,
            retention_failed: 2,
        }
    }

    async fn create_queue(temp: &TempDir) -> JobQueue {
        JobQueue::new(temp.path().join("queue.json"), fast_config())
            .await
            .unwrap()
    }

    fn test_job(agent: &str) -> Job {
        Job::new(
            agent,
            Uuid::new_v4(),
            EventType::Webhook,
            serde_json::json!({}),
        )
    }

    #[tokio::test]
    async fn test_enqueue_dequeue_ack() {
        let temp = TempDir::new().unwrap();
        let queue = create_queue(&temp).await;

        let job = test_job("a1");
        queue.enqueue(job.clone()).await.unwrap();

        let taken = queue.dequeue().await.unwrap();
        assert_eq!(taken.job_id, job.job_id);
        assert_eq!(taken.attempts, 1);

        queue.ack(taken.job_id).await.unwrap();
        assert_eq!(queue.backlog().await, 0);
        assert_eq!(queue.completed_jobs().await.len(), 1);
    }

    #[tokio::test]
    async fn test_nack_redelivers() {
        let temp = TempDir::new().unwrap();
        let queue = create_queue(&temp).await;

        let job = test_job("a1");
        queue.enqueue(job.clone()).await.unwrap();

        let first = queue.dequeue().await.unwrap();
        queue.nack(first.job_id).await.unwrap();

        // Redelivered after backoff, with the attempt count carried over.
        let second = queue.dequeue().await.unwrap();
        assert_eq!(second.job_id, job.job_id);
        assert_eq!(second.attempts, 2);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_move_to_failed_set() {
        let temp = TempDir::new().unwrap();
        let queue = create_queue(&temp).await;

        let job = test_job("a1");
        queue.enqueue(job.clone()).await.unwrap();

        for _ in 0..3 {
            let taken = queue.dequeue().await.unwrap();
            queue.nack(taken.job_id).await.unwrap();
        }

        assert_eq!(queue.backlog().await, 0);
        let failed = queue.failed_jobs().await;
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].job_id, job.job_id);
    }

    #[tokio::test]
    async fn test_failed_set_evicts_oldest() {
        let temp = TempDir::new().unwrap();
        let queue = create_queue(&temp).await;

        let mut job_ids = Vec::new();
        for i in 0..3 {
            let job = test_job(&format!("a{}", i));
            job_ids.push(job.job_id);
            queue.enqueue(job).await.unwrap();
            for _ in 0..3 {
                let taken = queue.dequeue().await.unwrap();
                queue.nack(taken.job_id).await.unwrap();
            }
        }

        // Retention is 2: the first failed job was evicted.
        let failed = queue.failed_jobs().await;
        assert_eq!(failed.len(), 2);
        assert_eq!(failed[0].job_id, job_ids[1]);
        assert_eq!(failed[1].job_id, job_ids[2]);
    }

    #[tokio::test]
    async fn test_completed_retention_bound() {
        let temp = TempDir::new().unwrap();
        let queue = create_queue(&temp).await;

        for _ in 0..5 {
            queue.enqueue(test_job("a1")).await.unwrap();
            let taken = queue.dequeue().await.unwrap();
            queue.ack(taken.job_id).await.unwrap();
        }

        assert_eq!(queue.completed_jobs().await.len(), 3);
    }

    #[tokio::test]
    async fn test_ack_unknown_job_is_error() {
        let temp = TempDir::new().unwrap();
        let queue = create_queue(&temp).await;
        assert!(queue.ack(Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn test_in_flight_recovered_on_restart() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("queue.json");

        let job = test_job("a1");
        {
            let queue = JobQueue::new(&path, fast_config()).await.unwrap();
            queue.enqueue(job.clone()).await.unwrap();
            let _taken = queue.dequeue().await.unwrap();
            // Dropped without ack: simulates a crash mid-processing.
        }

        let queue = JobQueue::new(&path, fast_config()).await.unwrap();
        assert_eq!(queue.backlog().await, 1);
        let redelivered = queue.dequeue().await.unwrap();
        assert_eq!(redelivered.job_id, job.job_id);
    }

    #[tokio::test]
    async fn test_dequeue_blocks_until_enqueue() {
        let temp = TempDir::new().unwrap();
        let queue = std::sync::Arc::new(create_queue(&temp).await);

        let waiter = {
            let queue = std::sync::Arc::clone(&queue);
            tokio::spawn(async move { queue.dequeue().await.unwrap() })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        queue.enqueue(test_job("a1")).await.unwrap();
        let job = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(job.agent_id, "a1");
    }
}
