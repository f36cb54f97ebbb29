//! Event ingestion endpoint
//!
//! Accepting an event means it is durably recorded and queued, not
//! processed; the response carries the event ID so callers can
//! correlate later log records.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use agent_runtime::RuntimeError;
use relay_core::event::EventType;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateEventRequest {
    agent_id: String,
    event_type: String,
    payload: Option<serde_json::Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateEventResponse {
    success: bool,
    event_id: Uuid,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

async fn create_event(
    State(state): State<AppState>,
    Json(request): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<CreateEventResponse>), (StatusCode, Json<ErrorResponse>)> {
    let event_type = EventType::parse(&request.event_type).map_err(|err| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: err.to_string(),
            }),
        )
    })?;

    let payload = request.payload.unwrap_or_else(|| serde_json::json!({}));

    match state
        .router()
        .route_event(&request.agent_id, event_type, payload)
        .await
    {
        Ok(event) => Ok((
            StatusCode::ACCEPTED,
            Json(CreateEventResponse {
                success: true,
                event_id: event.id,
            }),
        )),
        Err(RuntimeError::InvalidPayload(message)) => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse { error: message }),
        )),
        Err(err) => {
            error!("Failed to route event: {}", err);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: err.to_string(),
                }),
            ))
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/events", post(create_event))
}
