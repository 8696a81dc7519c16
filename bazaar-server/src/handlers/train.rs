use axum::extract::{Path, State};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use bazaar_core::{ApiError, JobKind, ModelType};
use bazaar_security::AuthenticatedUser;
use bazaar_service::types::{RetrainRequest, StatusResponse, TrainRequest};

use crate::sse::log_stream;
use crate::state::AppState;

/// `POST /train/{kind}` — `kind` is a model type, or `{type}-retrain` for
/// the retrain flow. The two variants carry different bodies, so dispatch
/// happens before deserialization.
pub async fn submit(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(kind): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if let Some(base_kind) = kind.strip_suffix("-retrain") {
        ModelType::parse(base_kind)
            .ok_or_else(|| ApiError::InvalidRequest(format!("unknown train kind '{kind}'")))?;
        let request: RetrainRequest = serde_json::from_value(body)
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        let model = state
            .models
            .retrain(&user, request.base_model_id, &request.model_name)
            .await?;
        return Ok(Json(json!({ "model_id": model.id })));
    }

    let model_type = ModelType::parse(&kind)
        .ok_or_else(|| ApiError::InvalidRequest(format!("unknown train kind '{kind}'")))?;
    let request: TrainRequest =
        serde_json::from_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
    let model = state.models.submit_train(&user, model_type, request).await?;
    Ok(Json(json!({ "model_id": model.id })))
}

pub async fn status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(model_id): Path<Uuid>,
) -> Result<Json<StatusResponse>, ApiError> {
    let status = state.models.status(&user, model_id, JobKind::Train).await?;
    Ok(Json(status))
}

pub async fn logs(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(model_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let logs = state.models.logs(&user, model_id, JobKind::Train).await?;
    Ok(Json(json!({ "logs": logs })))
}

pub async fn stream(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(model_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    // Authorization happens once up front; the poll loop re-reads logs only.
    state.models.status(&user, model_id, JobKind::Train).await?;
    Ok(log_stream(state, user, model_id, JobKind::Train))
}
