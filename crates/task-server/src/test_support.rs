//! Shared test helpers: an in-memory stub of the remote storage API

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{post, put};
use axum::Router;
use tokio::sync::RwLock;

use crate::storage::{RemoteStorage, StorageConfig};

type Slots = Arc<RwLock<HashMap<String, Vec<u8>>>>;
type Appends = Arc<RwLock<HashMap<String, Vec<Instant>>>>;

#[derive(Clone)]
struct StubState {
    slots: Slots,
    appends: Appends,
}

/// Handle to a running stub storage server
pub struct StubStorage {
    pub url: String,
    slots: Slots,
    appends: Appends,
}

impl StubStorage {
    /// Build a `RemoteStorage` client pointed at this stub
    pub fn client(&self) -> RemoteStorage {
        RemoteStorage::new(StorageConfig {
            api_url: self.url.clone(),
            token: None,
        })
    }

    /// Current value at a key, if any write reached it
    pub async fn value(&self, key: &str) -> Option<Vec<u8>> {
        self.slots.read().await.get(key).cloned()
    }

    /// Number of append calls a key has received
    pub async fn appends(&self, key: &str) -> usize {
        self.appends.read().await.get(key).map_or(0, Vec::len)
    }

    /// Arrival time of each append to a key, in order
    pub async fn append_instants(&self, key: &str) -> Vec<Instant> {
        self.appends.read().await.get(key).cloned().unwrap_or_default()
    }
}

async fn set_handler(
    State(state): State<StubState>,
    Path(key): Path<String>,
    body: Bytes,
) -> StatusCode {
    state.slots.write().await.insert(key, body.to_vec());
    StatusCode::OK
}

async fn append_handler(
    State(state): State<StubState>,
    Path(key): Path<String>,
    body: Bytes,
) -> StatusCode {
    state
        .slots
        .write()
        .await
        .entry(key.clone())
        .or_default()
        .extend_from_slice(&body);
    state
        .appends
        .write()
        .await
        .entry(key)
        .or_default()
        .push(Instant::now());
    StatusCode::OK
}

/// Start a stub storage server on an ephemeral port
pub async fn spawn_stub_storage() -> StubStorage {
    let slots: Slots = Arc::new(RwLock::new(HashMap::new()));
    let appends: Appends = Arc::new(RwLock::new(HashMap::new()));
    let state = StubState {
        slots: Arc::clone(&slots),
        appends: Arc::clone(&appends),
    };

    let app = Router::new()
        .route("/kv/{key}", put(set_handler))
        .route("/kv/{key}/append", post(append_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    StubStorage {
        url: format!("http://{}", addr),
        slots,
        appends,
    }
}
