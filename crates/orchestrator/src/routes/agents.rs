//! Per-agent resources: deployments, sessions, and log history

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::error;

use relay_core::logs::LogRecord;
use relay_core::session::{DeploymentState, DeploymentStatus, SandboxKind, SessionState};

use crate::state::AppState;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

type RouteError = (StatusCode, Json<ErrorResponse>);

fn internal_error(err: relay_core::Error) -> RouteError {
    error!("Agent store operation failed: {}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn not_found(what: &str) -> RouteError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("Not found: {}", what),
        }),
    )
}

// ============ Deployments ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterDeploymentRequest {
    sandbox_kind: SandboxKind,
    url: String,
    status: Option<DeploymentStatus>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeploymentResponse {
    agent_id: String,
    status: DeploymentStatus,
    sandbox_kind: SandboxKind,
    url: String,
}

impl From<DeploymentState> for DeploymentResponse {
    fn from(deployment: DeploymentState) -> Self {
        Self {
            agent_id: deployment.agent_id,
            status: deployment.status,
            sandbox_kind: deployment.sandbox_kind,
            url: deployment.url,
        }
    }
}

async fn register_deployment(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    Json(request): Json<RegisterDeploymentRequest>,
) -> Result<Json<DeploymentResponse>, RouteError> {
    let mut deployment = DeploymentState::new(&agent_id, request.sandbox_kind, request.url);
    if let Some(status) = request.status {
        deployment.status = status;
    }

    state
        .deployments()
        .save(&deployment)
        .await
        .map_err(internal_error)?;

    Ok(Json(deployment.into()))
}

async fn get_deployment(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> Result<Json<DeploymentResponse>, RouteError> {
    let deployment = state
        .deployments()
        .get(&agent_id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found(&format!("deployment for agent {}", agent_id)))?;

    Ok(Json(deployment.into()))
}

// ============ Sessions ============

#[derive(Debug, Deserialize)]
struct SaveSessionRequest {
    state: serde_json::Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    agent_id: String,
    session_id: String,
    state: serde_json::Value,
    last_active: String,
}

impl From<SessionState> for SessionResponse {
    fn from(session: SessionState) -> Self {
        Self {
            agent_id: session.agent_id,
            session_id: session.session_id,
            state: session.state,
            last_active: session.last_active.to_rfc3339(),
        }
    }
}

async fn save_session(
    State(state): State<AppState>,
    Path((agent_id, session_id)): Path<(String, String)>,
    Json(request): Json<SaveSessionRequest>,
) -> Result<Json<SessionResponse>, RouteError> {
    if !request.state.is_object() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "state must be a JSON object".to_string(),
            }),
        ));
    }

    let session = SessionState::new(&agent_id, &session_id, request.state);
    state
        .sessions()
        .save(&session)
        .await
        .map_err(internal_error)?;

    Ok(Json(session.into()))
}

async fn delete_session(
    State(state): State<AppState>,
    Path((agent_id, session_id)): Path<(String, String)>,
) -> Result<StatusCode, RouteError> {
    let removed = state
        .sessions()
        .delete(&agent_id, &session_id)
        .await
        .map_err(internal_error)?;

    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(&format!("session {}", session_id)))
    }
}

async fn get_session(
    State(state): State<AppState>,
    Path((agent_id, session_id)): Path<(String, String)>,
) -> Result<Json<SessionResponse>, RouteError> {
    let session = state
        .sessions()
        .get(&agent_id, &session_id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found(&format!("session {}", session_id)))?;

    Ok(Json(session.into()))
}

// ============ Log history ============

async fn get_logs(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> Result<Json<Vec<LogRecord>>, RouteError> {
    let records = state
        .logs()
        .load_for_agent(&agent_id)
        .await
        .map_err(internal_error)?;

    Ok(Json(records))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/agents/{agent_id}/deployment",
            get(get_deployment).put(register_deployment),
        )
        .route(
            "/agents/{agent_id}/sessions/{session_id}",
            get(get_session).put(save_session).delete(delete_session),
        )
        .route("/agents/{agent_id}/logs", get(get_logs))
}
