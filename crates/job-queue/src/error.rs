//! Error types for the job queue

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for queue operations
pub type Result<T> = std::result::Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    /// Job is not in the in-flight set
    #[error("Job not in flight: {0}")]
    JobNotInFlight(Uuid),

    /// IO error while persisting queue state
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Queue state could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
