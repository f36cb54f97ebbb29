//! Bounded worker pool over the job queue

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::queue::{Job, JobQueue};

/// Job body invoked by the worker pool
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> anyhow::Result<()>;
}

/// Fixed-concurrency pool of workers pulling from a shared queue
///
/// Each worker processes one job to completion (ack or nack) before
/// pulling the next; cross-worker execution is concurrent.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
}

impl WorkerPool {
    /// Spawn `concurrency` workers
    pub fn start<H>(queue: Arc<JobQueue>, concurrency: usize, handler: Arc<H>) -> Self
    where
        H: JobHandler + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut handles = Vec::with_capacity(concurrency);

        for worker_id in 0..concurrency {
            let queue = Arc::clone(&queue);
            let handler = Arc::clone(&handler);
            let mut shutdown_rx = shutdown_rx.clone();

            handles.push(tokio::spawn(async move {
                info!("Worker {} started", worker_id);
                loop {
                    let job = tokio::select! {
                        result = queue.dequeue() => match result {
                            Ok(job) => job,
                            Err(err) => {
                                error!("Worker {} dequeue failed: {}", worker_id, err);
                                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                                continue;
                            }
                        },
                        _ = shutdown_rx.changed() => break,
                    };

                    match handler.handle(&job).await {
                        Ok(()) => {
                            if let Err(err) = queue.ack(job.job_id).await {
                                error!("Worker {} failed to ack {}: {}", worker_id, job.job_id, err);
                            }
                        }
                        Err(err) => {
                            warn!(
                                "Worker {} job {} failed (attempt {}): {}",
                                worker_id, job.job_id, job.attempts, err
                            );
                            if let Err(err) = queue.nack(job.job_id).await {
                                error!(
                                    "Worker {} failed to nack {}: {}",
                                    worker_id, job.job_id, err
                                );
                            }
                        }
                    }
                }
                info!("Worker {} stopped", worker_id);
            }));
        }

        Self {
            handles,
            shutdown_tx,
        }
    }

    /// Stop all workers and wait for them to finish their current job
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::QueueConfig;
    use relay_core::event::EventType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;
    use uuid::Uuid;

    struct CountingHandler {
        processed: AtomicUsize,
        fail_agent: Option<String>,
    }

    #[async_trait]
    impl JobHandler for CountingHandler {
        async fn handle(&self, job: &Job) -> anyhow::Result<()> {
            if self.fail_agent.as_deref() == Some(job.agent_id.as_str()) {
                anyhow::bail!("induced failure");
            }
            self.processed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn wait_for<F: Fn() -> bool>(cond: F) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn test_pool_processes_jobs() {
        let temp = TempDir::new().unwrap();
        let queue = Arc::new(
            JobQueue::new(temp.path().join("queue.json"), QueueConfig::default())
                .await
                .unwrap(),
        );
        let handler = Arc::new(CountingHandler {
            processed: AtomicUsize::new(0),
            fail_agent: None,
        });

        let pool = WorkerPool::start(Arc::clone(&queue), 3, Arc::clone(&handler));

        for i in 0..6 {
            queue
                .enqueue(Job::new(
                    format!("a{}", i),
                    Uuid::new_v4(),
                    EventType::Webhook,
                    serde_json::json!({}),
                ))
                .await
                .unwrap();
        }

        wait_for(|| handler.processed.load(Ordering::SeqCst) == 6).await;
        pool.shutdown().await;
        assert_eq!(queue.completed_jobs().await.len(), 6);
    }

    #[tokio::test]
    async fn test_failing_job_lands_in_failed_set() {
        let temp = TempDir::new().unwrap();
        let config = QueueConfig {
            base_delay: Duration::from_millis(5),
            ..QueueConfig::default()
        };
        let queue = Arc::new(
            JobQueue::new(temp.path().join("queue.json"), config)
                .await
                .unwrap(),
        );
        let handler = Arc::new(CountingHandler {
            processed: AtomicUsize::new(0),
            fail_agent: Some("bad".to_string()),
        });

        let pool = WorkerPool::start(Arc::clone(&queue), 2, Arc::clone(&handler));

        queue
            .enqueue(Job::new(
                "bad",
                Uuid::new_v4(),
                EventType::Webhook,
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        queue
            .enqueue(Job::new(
                "good",
                Uuid::new_v4(),
                EventType::Webhook,
                serde_json::json!({}),
            ))
            .await
            .unwrap();

        // The good job completes; the bad one exhausts its retries.
        wait_for(|| handler.processed.load(Ordering::SeqCst) == 1).await;

        let queue_check = Arc::clone(&queue);
        for _ in 0..200 {
            if queue_check.failed_jobs().await.len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        pool.shutdown().await;
        let failed = queue.failed_jobs().await;
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].agent_id, "bad");
    }
}
