//! Shared test fixture: a fully wired `AppState` over a temp directory

use std::sync::Arc;

use tempfile::TempDir;

use agent_runtime::EventRouter;
use job_queue::{JobQueue, QueueConfig};
use relay_core::event::FileEventStore;
use relay_core::logs::LogStore;
use relay_core::session::{DeploymentStore, SessionStore};
use relay_core::store::{Cache, DurableStore, FileStore, MemoryCache};
use relay_core::template::{TemplateDefaults, TemplateStore};

use crate::state::AppState;

pub struct Fixture {
    pub state: AppState,
    pub queue: Arc<JobQueue>,
    pub events: Arc<FileEventStore>,
    _temp: TempDir,
}

pub async fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();

    let events = Arc::new(
        FileEventStore::new(temp.path().join("events.json"))
            .await
            .unwrap(),
    );
    let queue = Arc::new(
        JobQueue::new(temp.path().join("queue.json"), QueueConfig::default())
            .await
            .unwrap(),
    );
    let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
    let durable: Arc<dyn DurableStore> = Arc::new(
        FileStore::new(temp.path().join("state.json"))
            .await
            .unwrap(),
    );
    let deployments = Arc::new(DeploymentStore::new(
        Arc::clone(&cache),
        Arc::clone(&durable),
    ));
    let sessions = Arc::new(SessionStore::new(Arc::clone(&cache), Arc::clone(&durable)));
    let templates = Arc::new(TemplateStore::new(
        cache,
        durable,
        TemplateDefaults {
            conductor_template: "conductor_default".to_string(),
            worker_template: "worker_default".to_string(),
            infrastructure_template: "infra_default".to_string(),
        },
    ));
    let logs = Arc::new(LogStore::new(temp.path().to_path_buf()).await.unwrap());

    let router = EventRouter::new(Arc::clone(&events), Arc::clone(&queue));
    let state = AppState::new(router, deployments, sessions, templates, logs);

    Fixture {
        state,
        queue,
        events,
        _temp: temp,
    }
}
