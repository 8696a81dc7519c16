use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use bazaar_core::{ApiError, ModelType, Permission};
use bazaar_data::Model;
use bazaar_security::AuthenticatedUser;
use bazaar_service::types::{AccessRequest, ModelDetail};

use crate::state::AppState;

pub async fn list(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Model>>, ApiError> {
    Ok(Json(state.models.list_visible(&user).await?))
}

pub async fn detail(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(model_id): Path<Uuid>,
) -> Result<Json<ModelDetail>, ApiError> {
    Ok(Json(state.models.detail(&user, model_id).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(model_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.models.delete(&user, model_id).await?;
    Ok(Json(json!({})))
}

pub async fn set_access(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(model_id): Path<Uuid>,
    Json(body): Json<AccessRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .models
        .set_access(&user, model_id, body.access, body.default_permission)
        .await?;
    Ok(Json(json!({})))
}

#[derive(Debug, Deserialize)]
pub struct TeamAssignRequest {
    pub team_id: Option<Uuid>,
}

pub async fn assign_team(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(model_id): Path<Uuid>,
    Json(body): Json<TeamAssignRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.models.assign_team(&user, model_id, body.team_id).await?;
    Ok(Json(json!({})))
}

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub user_id: Uuid,
    pub permission: Permission,
}

pub async fn grant(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(model_id): Path<Uuid>,
    Json(body): Json<GrantRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .models
        .grant(&user, model_id, body.user_id, body.permission)
        .await?;
    Ok(Json(json!({})))
}

pub async fn revoke(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((model_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.models.revoke(&user, model_id, user_id).await?;
    Ok(Json(json!({})))
}

/// `GET /model/{id}/download` — stream the zipped artifact tree.
pub async fn download(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(model_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let reader = state.models.download(&user, model_id).await?;
    let body = Body::from_stream(ReaderStream::new(reader));
    Response::builder()
        .header(header::CONTENT_TYPE, "application/zip")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{model_id}.zip\""),
        )
        .body(body)
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// `POST /model/upload` — multipart import of a model archive.
///
/// Fields: `name` (text), `type` (text, a model type), `file` (the zip).
pub async fn upload(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut name = None;
    let mut model_type = None;
    let mut archive = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?
    {
        match field.name() {
            Some("name") => {
                name = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?,
                );
            }
            Some("type") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
                model_type = Some(ModelType::parse(&raw).ok_or_else(|| {
                    ApiError::InvalidRequest(format!("unknown model type '{raw}'"))
                })?);
            }
            Some("file") => {
                archive = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?,
                );
            }
            _ => {}
        }
    }

    let name = name.ok_or_else(|| ApiError::InvalidRequest("missing field 'name'".into()))?;
    let model_type =
        model_type.ok_or_else(|| ApiError::InvalidRequest("missing field 'type'".into()))?;
    let archive =
        archive.ok_or_else(|| ApiError::InvalidRequest("missing field 'file'".into()))?;

    let model = state.models.import(&user, &name, model_type, archive).await?;
    Ok(Json(json!({ "model_id": model.id })))
}
