//! Event routing and runtime supervision
//!
//! Takes recorded events from the job queue, resolves a per-agent
//! runtime handle (built once per agent via single-flight), and drives
//! the container execution server to process each event.

mod client;
mod error;
mod handle;
mod router;
mod supervisor;

pub use client::{ExecuteTaskRequest, HttpTaskClient, TaskApi};
pub use error::{Result, RuntimeError};
pub use handle::{DeploymentHandleFactory, HandleFactory, HandleRegistry, RuntimeHandle};
pub use router::EventRouter;
pub use supervisor::RuntimeSupervisor;
