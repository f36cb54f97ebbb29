//! Socket.IO bridge for live log subscribers
//!
//! Clients emit `logs:subscribe` with an agent ID and then receive a
//! `logs:record` event for every record published on that agent's
//! topic. Delivery is best-effort: a lagging client skips records, a
//! disconnected client tears down its forwarder.

use std::sync::Arc;

use serde::Deserialize;
use socketioxide::extract::{Data, SocketRef, State};
use socketioxide::{SocketIo, TransportType};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use relay_core::logs::LogPublisher;

/// Shared state for Socket.IO handlers
#[derive(Clone)]
pub struct SocketState {
    pub publisher: Arc<LogPublisher>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribePayload {
    pub agent_id: String,
}

/// Handle new socket connection
pub async fn on_connect(socket: SocketRef, State(_state): State<SocketState>) {
    info!("Client connected: {}", socket.id);

    socket.on(
        "logs:subscribe",
        |socket: SocketRef, State(state): State<SocketState>, Data(data): Data<SubscribePayload>| async move {
            handle_subscribe(socket, state, data).await;
        },
    );

    socket.on_disconnect(|socket: SocketRef| async move {
        info!("Client disconnected: {}", socket.id);
    });
}

async fn handle_subscribe(socket: SocketRef, state: SocketState, data: SubscribePayload) {
    info!(
        "Client {} subscribed to logs for agent {}",
        socket.id, data.agent_id
    );

    let mut rx = state.publisher.subscribe(&data.agent_id).await;

    // One forwarder per subscription; it dies with the socket.
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(record) => {
                    if socket.emit("logs:record", &record).is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Log subscriber lagged, skipped {} records", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// Create and configure Socket.IO layer
pub fn create_socket_layer(state: SocketState) -> (socketioxide::layer::SocketIoLayer, SocketIo) {
    let (layer, io) = SocketIo::builder()
        .with_state(state)
        // Only allow WebSocket transport to avoid CORS issues with polling
        .transports([TransportType::Websocket])
        .build_layer();

    io.ns("/", on_connect);

    (layer, io)
}
