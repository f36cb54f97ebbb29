//! Session and deployment state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-session agent state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub agent_id: String,
    pub session_id: String,
    /// Opaque agent-defined state map
    pub state: serde_json::Value,
    pub last_active: DateTime<Utc>,
}

impl SessionState {
    pub fn new(
        agent_id: impl Into<String>,
        session_id: impl Into<String>,
        state: serde_json::Value,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            session_id: session_id.into(),
            state,
            last_active: Utc::now(),
        }
    }

    /// Bump the activity timestamp
    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }
}

/// Where an agent runtime is deployed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxKind {
    Container,
    Vm,
    Local,
}

/// Deployment lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Deploying,
    Running,
    Stopped,
    Error,
}

/// Deployment state for one agent's runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentState {
    pub agent_id: String,
    pub status: DeploymentStatus,
    pub sandbox_kind: SandboxKind,
    /// Base URL of the container execution server
    pub url: String,
}

impl DeploymentState {
    pub fn new(
        agent_id: impl Into<String>,
        sandbox_kind: SandboxKind,
        url: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            status: DeploymentStatus::Deploying,
            sandbox_kind,
            url: url.into(),
        }
    }
}
