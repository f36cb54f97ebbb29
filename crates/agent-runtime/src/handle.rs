//! Per-agent runtime handles with single-flight construction
//!
//! A handle caches the agent's deployment and task client so events
//! for the same agent do not refetch configuration. Handles live for
//! the life of the process and are never evicted; configuration
//! changes for an agent require a restart to take effect.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{OnceCell, RwLock};
use tracing::info;

use relay_core::event::Event;
use relay_core::session::{DeploymentState, DeploymentStatus, DeploymentStore, SandboxKind};

use crate::client::{ExecuteTaskRequest, HttpTaskClient, TaskApi};
use crate::error::{Result, RuntimeError};

/// Cached execution context for one agent
pub struct RuntimeHandle {
    pub agent_id: String,
    pub deployment: DeploymentState,
    client: Arc<dyn TaskApi>,
}

impl RuntimeHandle {
    pub fn new(
        agent_id: impl Into<String>,
        deployment: DeploymentState,
        client: Arc<dyn TaskApi>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            deployment,
            client,
        }
    }

    /// Process one event by dispatching a task to the agent's runtime
    pub async fn process_event(&self, event: &Event) -> Result<()> {
        let session_id = event
            .payload
            .get("sessionId")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("evt-{}", event.id));

        let prompt = match event.payload.get("prompt").and_then(|v| v.as_str()) {
            Some(prompt) => prompt.to_string(),
            None => format!(
                "Handle {} event: {}",
                event.event_type.as_str(),
                serde_json::to_string(&event.payload)
                    .map_err(relay_core::Error::Serialization)?
            ),
        };

        let request = ExecuteTaskRequest {
            agent_id: self.agent_id.clone(),
            session_id,
            prompt,
            env: None,
            storage: None,
        };

        self.client.execute(&request).await
    }
}

/// Builds a handle on first use for an agent
#[async_trait]
pub trait HandleFactory: Send + Sync {
    async fn build(&self, agent_id: &str) -> Result<RuntimeHandle>;
}

/// Default factory: resolve the agent's deployment, fall back to a
/// shared runtime URL when none is recorded
pub struct DeploymentHandleFactory {
    deployments: Arc<DeploymentStore>,
    default_url: Option<String>,
}

impl DeploymentHandleFactory {
    pub fn new(deployments: Arc<DeploymentStore>, default_url: Option<String>) -> Self {
        Self {
            deployments,
            default_url,
        }
    }
}

#[async_trait]
impl HandleFactory for DeploymentHandleFactory {
    async fn build(&self, agent_id: &str) -> Result<RuntimeHandle> {
        let deployment = match self.deployments.get(agent_id).await? {
            Some(deployment) => deployment,
            None => {
                let url = self.default_url.clone().ok_or_else(|| {
                    RuntimeError::DeploymentNotFound {
                        agent_id: agent_id.to_string(),
                    }
                })?;
                let mut deployment = DeploymentState::new(agent_id, SandboxKind::Container, url);
                deployment.status = DeploymentStatus::Running;
                deployment
            }
        };

        info!(
            "Built runtime handle for agent {} at {}",
            agent_id, deployment.url
        );

        let client = Arc::new(HttpTaskClient::new(deployment.url.clone()));
        Ok(RuntimeHandle::new(agent_id, deployment, client))
    }
}

/// Registry of runtime handles keyed by agent ID
///
/// Construction is single-flight per key: concurrent lookups for the
/// same agent build exactly one handle. A failed build leaves the slot
/// empty so the next lookup retries.
pub struct HandleRegistry {
    factory: Arc<dyn HandleFactory>,
    entries: RwLock<HashMap<String, Arc<OnceCell<Arc<RuntimeHandle>>>>>,
}

impl HandleRegistry {
    pub fn new(factory: Arc<dyn HandleFactory>) -> Self {
        Self {
            factory,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Get the agent's handle, building it on first use
    pub async fn get(&self, agent_id: &str) -> Result<Arc<RuntimeHandle>> {
        let cell = {
            let entries = self.entries.read().await;
            entries.get(agent_id).cloned()
        };

        let cell = match cell {
            Some(cell) => cell,
            None => {
                let mut entries = self.entries.write().await;
                Arc::clone(
                    entries
                        .entry(agent_id.to_string())
                        .or_insert_with(|| Arc::new(OnceCell::new())),
                )
            }
        };

        let handle = cell
            .get_or_try_init(|| async {
                self.factory.build(agent_id).await.map(Arc::new)
            })
            .await?;

        Ok(Arc::clone(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullClient;

    #[async_trait]
    impl TaskApi for NullClient {
        async fn execute(&self, _request: &ExecuteTaskRequest) -> Result<()> {
            Ok(())
        }
    }

    struct CountingFactory {
        builds: AtomicUsize,
        delay_ms: u64,
    }

    #[async_trait]
    impl HandleFactory for CountingFactory {
        async fn build(&self, agent_id: &str) -> Result<RuntimeHandle> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            // Widen the race window so concurrent lookups overlap.
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
            let mut deployment =
                DeploymentState::new(agent_id, SandboxKind::Container, "http://runtime");
            deployment.status = DeploymentStatus::Running;
            Ok(RuntimeHandle::new(agent_id, deployment, Arc::new(NullClient)))
        }
    }

    #[tokio::test]
    async fn test_concurrent_lookups_build_one_handle() {
        let factory = Arc::new(CountingFactory {
            builds: AtomicUsize::new(0),
            delay_ms: 20,
        });
        let registry = Arc::new(HandleRegistry::new(
            Arc::clone(&factory) as Arc<dyn HandleFactory>
        ));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(
                async move { registry.get("a1").await.unwrap() },
            ));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_agents_get_distinct_handles() {
        let factory = Arc::new(CountingFactory {
            builds: AtomicUsize::new(0),
            delay_ms: 0,
        });
        let registry = HandleRegistry::new(Arc::clone(&factory) as Arc<dyn HandleFactory>);

        let h1 = registry.get("a1").await.unwrap();
        let h2 = registry.get("a2").await.unwrap();
        assert_eq!(h1.agent_id, "a1");
        assert_eq!(h2.agent_id, "a2");
        assert_eq!(factory.builds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_handle_is_reused() {
        let factory = Arc::new(CountingFactory {
            builds: AtomicUsize::new(0),
            delay_ms: 0,
        });
        let registry = HandleRegistry::new(Arc::clone(&factory) as Arc<dyn HandleFactory>);

        registry.get("a1").await.unwrap();
        registry.get("a1").await.unwrap();
        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
    }

    struct FlakyFactory {
        builds: AtomicUsize,
    }

    #[async_trait]
    impl HandleFactory for FlakyFactory {
        async fn build(&self, agent_id: &str) -> Result<RuntimeHandle> {
            if self.builds.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(RuntimeError::DeploymentNotFound {
                    agent_id: agent_id.to_string(),
                });
            }
            let deployment =
                DeploymentState::new(agent_id, SandboxKind::Container, "http://runtime");
            Ok(RuntimeHandle::new(agent_id, deployment, Arc::new(NullClient)))
        }
    }

    #[tokio::test]
    async fn test_failed_build_retries_on_next_lookup() {
        let factory = Arc::new(FlakyFactory {
            builds: AtomicUsize::new(0),
        });
        let registry = HandleRegistry::new(Arc::clone(&factory) as Arc<dyn HandleFactory>);

        assert!(registry.get("a1").await.is_err());
        assert!(registry.get("a1").await.is_ok());
        assert_eq!(factory.builds.load(Ordering::SeqCst), 2);
    }
}
