//! Error types for agent-runtime

use thiserror::Error;

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Core store operation failed
    #[error(transparent)]
    Core(#[from] relay_core::Error),

    /// Queue operation failed
    #[error(transparent)]
    Queue(#[from] job_queue::QueueError),

    /// No deployment recorded for an agent and no default runtime URL
    #[error("No runtime deployment for agent: {agent_id}")]
    DeploymentNotFound { agent_id: String },

    /// The container execution server rejected or dropped a task request
    #[error("Task request failed: {0}")]
    TaskRequest(String),

    /// Event payload failed validation
    #[error("Invalid event payload: {0}")]
    InvalidPayload(String),

    /// Referenced event is missing from the event store
    #[error("Event not found: {0}")]
    EventNotFound(uuid::Uuid),
}
