//! Task acceptance endpoint
//!
//! The response never waits on the task: the caller may be under a
//! hard wall-clock timeout far shorter than agent task durations, so
//! the work is handed to a detached supervision task and the request
//! is acknowledged immediately.

use std::collections::HashMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::state::AppState;
use crate::storage::StorageConfig;
use crate::task::{run_task, TaskSpec};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteRequest {
    agent_id: Option<String>,
    session_id: Option<String>,
    prompt: Option<String>,
    env: Option<HashMap<String, String>>,
    storage: Option<StorageConfig>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteResponse {
    success: bool,
    agent_id: String,
    session_id: String,
    status: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(format!("Missing required field: {}", field)),
    }
}

async fn execute(
    State(state): State<AppState>,
    Json(request): Json<ExecuteRequest>,
) -> Result<(StatusCode, Json<ExecuteResponse>), (StatusCode, Json<ErrorResponse>)> {
    let validated = (|| {
        let agent_id = required(&request.agent_id, "agentId")?.to_string();
        let session_id = required(&request.session_id, "sessionId")?.to_string();
        let prompt = required(&request.prompt, "prompt")?.to_string();
        Ok::<_, String>((agent_id, session_id, prompt))
    })();

    let (agent_id, session_id, prompt) = match validated {
        Ok(fields) => fields,
        Err(error) => return Err((StatusCode::BAD_REQUEST, Json(ErrorResponse { error }))),
    };

    if let Some(storage) = request.storage {
        info!("Updating storage configuration from task request");
        state.set_storage(storage).await;
    }

    // Snapshot the storage config at task start; later updates do not
    // affect this task's writes.
    let storage = state.storage().await;
    let config = state.config();
    let spec = TaskSpec {
        agent_id: agent_id.clone(),
        session_id: session_id.clone(),
        prompt,
        env: request.env.unwrap_or_default(),
        command: config.agent_command.clone(),
        args: config.agent_args.clone(),
    };

    info!("Accepted task for agent {} session {}", agent_id, session_id);
    tokio::spawn(run_task(spec, storage));

    Ok((
        StatusCode::ACCEPTED,
        Json(ExecuteResponse {
            success: true,
            agent_id,
            session_id,
            status: "started",
        }),
    ))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/execute", post(execute))
}
