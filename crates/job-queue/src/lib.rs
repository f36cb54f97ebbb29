//! Durable at-least-once job queue
//!
//! Decouples event ingestion from processing. Jobs are persisted on
//! every mutation, redelivered on failure with exponential backoff,
//! and retired into bounded completed/failed sets.

mod error;
mod queue;
mod worker;

pub use error::{QueueError, Result};
pub use queue::{Job, JobQueue, QueueConfig};
pub use worker::{JobHandler, WorkerPool};
