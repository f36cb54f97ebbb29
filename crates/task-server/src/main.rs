//! Container Execution Server
//!
//! Runs inside the isolated agent runtime. Accepts one task request at
//! a time over HTTP, spawns a detached child process for the actual
//! agent logic, and streams its output to remote storage while
//! answering its own caller immediately.

mod routes;
mod state;
mod storage;
mod task;

#[cfg(test)]
mod test_support;

use std::net::SocketAddr;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::state::{AppState, ServerConfig};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "task_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    let host = config.host.clone();
    let port = config.port;

    let state = AppState::new(config).await;
    if state.storage_configured().await {
        tracing::info!("Storage configured from environment");
    } else {
        tracing::warn!("No storage configured yet; waiting for first task request");
    }

    let app = Router::new()
        .merge(routes::health::router())
        .merge(routes::execute::router())
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = match format!("{}:{}", host, port).parse() {
        Ok(addr) => addr,
        Err(err) => {
            tracing::error!("Invalid bind address {}:{}: {}", host, port, err);
            std::process::exit(1);
        }
    };

    tracing::info!("Task server listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("Failed to bind {}: {}", addr, err);
            std::process::exit(1);
        }
    };

    // Stop accepting on SIGTERM/ctrl-c, finish in-flight responses,
    // then exit. Detached children keep running.
    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", err);
        std::process::exit(1);
    }
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

    tracing::info!("Shutdown signal received");
}
