//! Typed session and deployment stores
//!
//! Thin wrappers over `TieredStore` that own the key scheme and the
//! one-hour cache TTL.

use std::sync::Arc;
use std::time::Duration;

use super::model::{DeploymentState, SessionState};
use crate::store::{Cache, DurableStore, TieredStore};
use crate::Result;

/// Cache TTL for session and deployment state
pub const SESSION_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

fn session_key(agent_id: &str, session_id: &str) -> String {
    format!("session:{}:{}", agent_id, session_id)
}

fn deployment_key(agent_id: &str) -> String {
    format!("deployment:{}", agent_id)
}

/// Store for per-session agent state
pub struct SessionStore {
    tiered: TieredStore,
}

impl SessionStore {
    pub fn new(cache: Arc<dyn Cache>, durable: Arc<dyn DurableStore>) -> Self {
        Self {
            tiered: TieredStore::new(cache, durable, SESSION_CACHE_TTL),
        }
    }

    pub async fn get(&self, agent_id: &str, session_id: &str) -> Result<Option<SessionState>> {
        let Some(value) = self.tiered.get(&session_key(agent_id, session_id)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_value(value)?))
    }

    pub async fn save(&self, session: &SessionState) -> Result<()> {
        let key = session_key(&session.agent_id, &session.session_id);
        self.tiered.save(&key, serde_json::to_value(session)?).await
    }

    pub async fn delete(&self, agent_id: &str, session_id: &str) -> Result<bool> {
        self.tiered.delete(&session_key(agent_id, session_id)).await
    }
}

/// Store for per-agent deployment state
pub struct DeploymentStore {
    tiered: TieredStore,
}

impl DeploymentStore {
    pub fn new(cache: Arc<dyn Cache>, durable: Arc<dyn DurableStore>) -> Self {
        Self {
            tiered: TieredStore::new(cache, durable, SESSION_CACHE_TTL),
        }
    }

    pub async fn get(&self, agent_id: &str) -> Result<Option<DeploymentState>> {
        let Some(value) = self.tiered.get(&deployment_key(agent_id)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_value(value)?))
    }

    pub async fn save(&self, deployment: &DeploymentState) -> Result<()> {
        let key = deployment_key(&deployment.agent_id);
        self.tiered
            .save(&key, serde_json::to_value(deployment)?)
            .await
    }
}
