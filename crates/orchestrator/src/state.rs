//! Shared application state

use std::sync::Arc;

use agent_runtime::EventRouter;
use relay_core::logs::LogStore;
use relay_core::session::{DeploymentStore, SessionStore};
use relay_core::template::TemplateStore;

/// Shared state for the REST routes
///
/// Everything here is constructed once in `main` and injected; there
/// are no lazily created globals.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    router: EventRouter,
    deployments: Arc<DeploymentStore>,
    sessions: Arc<SessionStore>,
    templates: Arc<TemplateStore>,
    logs: Arc<LogStore>,
}

impl AppState {
    pub fn new(
        router: EventRouter,
        deployments: Arc<DeploymentStore>,
        sessions: Arc<SessionStore>,
        templates: Arc<TemplateStore>,
        logs: Arc<LogStore>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                router,
                deployments,
                sessions,
                templates,
                logs,
            }),
        }
    }

    pub fn router(&self) -> &EventRouter {
        &self.inner.router
    }

    pub fn deployments(&self) -> &DeploymentStore {
        &self.inner.deployments
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.inner.templates
    }

    pub fn logs(&self) -> &LogStore {
        &self.inner.logs
    }
}
