//! Session and deployment state over the two-tier store

mod model;
mod store;

pub use model::{DeploymentState, DeploymentStatus, SandboxKind, SessionState};
pub use store::{DeploymentStore, SessionStore, SESSION_CACHE_TTL};
