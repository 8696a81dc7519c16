use axum::extract::{Path, State};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use bazaar_core::{ApiError, JobKind, LogLevel};
use bazaar_security::{AuthenticatedUser, JobAuth};
use bazaar_service::types::{
    DeployRequest, JobLogRequest, SaveRequest, SaveResponse, StatusResponse, UpdateStatusRequest,
};

use crate::sse::log_stream;
use crate::state::AppState;

pub async fn submit(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(model_id): Path<Uuid>,
    Json(body): Json<DeployRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.models.submit_deploy(&user, model_id, body).await?;
    Ok(Json(json!({})))
}

pub async fn undeploy(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(model_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.models.undeploy(&user, model_id).await?;
    Ok(Json(json!({})))
}

pub async fn status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(model_id): Path<Uuid>,
) -> Result<Json<StatusResponse>, ApiError> {
    let status = state.models.status(&user, model_id, JobKind::Deploy).await?;
    Ok(Json(status))
}

pub async fn logs(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(model_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let logs = state.models.logs(&user, model_id, JobKind::Deploy).await?;
    Ok(Json(json!({ "logs": logs })))
}

/// `GET /deploy/{model_id}/endpoints` — live allocations of the deployment,
/// discovered from the orchestrator's service catalog.
pub async fn endpoints(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(model_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let endpoints = state.models.deployment_endpoints(&user, model_id).await?;
    Ok(Json(json!({ "endpoints": endpoints })))
}

pub async fn stream(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(model_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state.models.status(&user, model_id, JobKind::Deploy).await?;
    Ok(log_stream(state, user, model_id, JobKind::Deploy))
}

/// `POST /deploy/{model_id}/save` — called from inside a deployed model's
/// UI; requires read on the source model.
pub async fn save(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(model_id): Path<Uuid>,
    Json(body): Json<SaveRequest>,
) -> Result<Json<SaveResponse>, ApiError> {
    let response = state.models.save_deployed(&user, model_id, body).await?;
    Ok(Json(response))
}

/// `POST /deploy/update-status` — job-auth; a running job reports progress
/// on exactly the model its token is scoped to.
pub async fn update_status(
    State(state): State<AppState>,
    JobAuth(claims): JobAuth,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.models.update_status_from_job(claims, body).await?;
    Ok(Json(json!({})))
}

/// `POST /deploy/log` — job-auth; append a warning or error to the model's
/// job log.
pub async fn append_log(
    State(state): State<AppState>,
    JobAuth(claims): JobAuth,
    Json(body): Json<JobLogRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let level = LogLevel::parse(&body.level)
        .ok_or_else(|| ApiError::InvalidRequest(format!("unknown level '{}'", body.level)))?;
    state
        .models
        .append_job_log(claims, level, &body.message)
        .await?;
    Ok(Json(json!({})))
}
