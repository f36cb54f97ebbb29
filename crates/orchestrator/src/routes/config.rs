//! Template configuration endpoints

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::error;

use relay_core::template::TemplateConfig;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TemplateConfigResponse {
    conductor_template: String,
    worker_template: String,
    infrastructure_template: String,
    last_updated: String,
    updated_by: String,
}

impl From<TemplateConfig> for TemplateConfigResponse {
    fn from(config: TemplateConfig) -> Self {
        Self {
            conductor_template: config.conductor_template,
            worker_template: config.worker_template,
            infrastructure_template: config.infrastructure_template,
            last_updated: config.last_updated.to_rfc3339(),
            updated_by: config.updated_by,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateTemplateRequest {
    conductor_template: String,
    worker_template: String,
    infrastructure_template: String,
    updated_by: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

type RouteError = (StatusCode, Json<ErrorResponse>);

fn internal_error(err: relay_core::Error) -> RouteError {
    error!("Template config operation failed: {}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

async fn get_templates(
    State(state): State<AppState>,
) -> Result<Json<TemplateConfigResponse>, RouteError> {
    let config = state.templates().get().await.map_err(internal_error)?;
    Ok(Json(config.into()))
}

async fn update_templates(
    State(state): State<AppState>,
    Json(request): Json<UpdateTemplateRequest>,
) -> Result<Json<TemplateConfigResponse>, RouteError> {
    let config = TemplateConfig::new(
        request.conductor_template,
        request.worker_template,
        request.infrastructure_template,
        request.updated_by.unwrap_or_else(|| "api".to_string()),
    );

    match state.templates().update(config).await {
        Ok(saved) => Ok(Json(saved.into())),
        Err(err @ relay_core::Error::InvalidInput(_)) => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: err.to_string(),
            }),
        )),
        Err(err) => Err(internal_error(err)),
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/config/templates", get(get_templates).put(update_templates))
}
