//! Agent Relay orchestrator
//!
//! Wires the durable stores, job queue, worker pool, and log fan-out,
//! then serves event ingestion over REST and live log subscriptions
//! over Socket.IO.

mod routes;
mod socket;
mod state;

#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_runtime::{
    DeploymentHandleFactory, EventRouter, HandleFactory, HandleRegistry, RuntimeSupervisor,
};
use job_queue::{JobQueue, QueueConfig, WorkerPool};
use relay_core::event::FileEventStore;
use relay_core::logs::{LogPublisher, LogStore};
use relay_core::session::{DeploymentStore, SessionStore};
use relay_core::store::{Cache, DurableStore, FileStore, MemoryCache};
use relay_core::template::{TemplateDefaults, TemplateStore};

use crate::socket::{create_socket_layer, SocketState};
use crate::state::AppState;

const DEFAULT_WORKER_CONCURRENCY: usize = 5;

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "orchestrator=debug,tower_http=debug,socketioxide=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(err) = run().await {
        tracing::error!("Fatal: {:#}", err);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let data_dir = std::env::var("RELAY_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".relay-data"));
    tracing::info!("Using data directory: {:?}", data_dir);
    tokio::fs::create_dir_all(&data_dir).await?;

    // Durable stores and the shared cache tier.
    let events = Arc::new(FileEventStore::new(data_dir.join("events.json")).await?);
    let queue = Arc::new(JobQueue::new(data_dir.join("queue.json"), QueueConfig::default()).await?);
    let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
    let durable: Arc<dyn DurableStore> =
        Arc::new(FileStore::new(data_dir.join("state.json")).await?);
    let deployments = Arc::new(DeploymentStore::new(
        Arc::clone(&cache),
        Arc::clone(&durable),
    ));
    let sessions = Arc::new(SessionStore::new(Arc::clone(&cache), Arc::clone(&durable)));
    let templates = Arc::new(TemplateStore::new(
        cache,
        durable,
        TemplateDefaults::from_env(),
    ));
    let logs = Arc::new(LogStore::new(data_dir.clone()).await?);
    let publisher = Arc::new(LogPublisher::new());

    // Runtime supervision: handles are built once per agent on first
    // use, from the recorded deployment or the shared default URL.
    let default_task_url = std::env::var("AGENT_TASK_URL").ok();
    let factory = Arc::new(DeploymentHandleFactory::new(
        Arc::clone(&deployments),
        default_task_url,
    ));
    let registry = Arc::new(HandleRegistry::new(factory as Arc<dyn HandleFactory>));
    let supervisor = Arc::new(RuntimeSupervisor::new(
        Arc::clone(&events),
        registry,
        Arc::clone(&logs),
        Arc::clone(&publisher),
    ));

    let concurrency = env_or("RELAY_WORKER_CONCURRENCY", DEFAULT_WORKER_CONCURRENCY);
    let pool = WorkerPool::start(Arc::clone(&queue), concurrency, supervisor);
    tracing::info!("Worker pool started with {} workers", concurrency);

    let router = EventRouter::new(Arc::clone(&events), Arc::clone(&queue));
    let app_state = AppState::new(router, deployments, sessions, templates, logs);

    // REST API server
    let rest_app = Router::new()
        .merge(routes::health::router())
        .merge(routes::events::router())
        .merge(routes::agents::router())
        .merge(routes::config::router())
        .with_state(app_state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Socket.IO server
    let (socket_layer, _io) = create_socket_layer(SocketState { publisher });
    let socket_app = Router::new()
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(socket_layer);

    let rest_addr = SocketAddr::from(([0, 0, 0, 0], env_or("RELAY_HTTP_PORT", 8081u16)));
    let socket_addr = SocketAddr::from(([0, 0, 0, 0], env_or("RELAY_SOCKET_PORT", 8080u16)));

    let rest_listener = tokio::net::TcpListener::bind(rest_addr).await?;
    let socket_listener = tokio::net::TcpListener::bind(socket_addr).await?;

    tracing::info!("REST API listening on {}", rest_addr);
    tracing::info!("Socket.IO listening on {}", socket_addr);

    tokio::select! {
        result = axum::serve(rest_listener, rest_app) => result?,
        result = axum::serve(socket_listener, socket_app) => result?,
        _ = shutdown_signal() => tracing::info!("Shutdown signal received"),
    }

    // Let in-flight jobs reach an ack or nack before exiting; anything
    // still pending is redelivered on the next start.
    pool.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => tracing::error!("Failed to install SIGTERM handler: {}", err),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
