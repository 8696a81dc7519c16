use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use bazaar_core::ApiError;
use bazaar_data::Upload;
use bazaar_security::AuthenticatedUser;
use bazaar_service::types::UploadDetail;

use crate::state::AppState;

/// `POST /upload` — stage a group of files (CSV/PDF/DOCX) for a later train
/// request. Returns the upload id the train body references.
pub async fn stage(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?
    {
        let Some(file_name) = field.file_name().map(String::from) else {
            continue;
        };
        let contents = field
            .bytes()
            .await
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        files.push((file_name, contents));
    }
    let upload = state.models.stage_upload(&user, files).await?;
    Ok(Json(json!({ "upload_id": upload.id })))
}

/// `GET /upload/list` — uploads staged by the caller, newest first.
pub async fn list(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Upload>>, ApiError> {
    Ok(Json(state.models.list_uploads(&user).await?))
}

/// `GET /upload/{upload_id}` — one upload and the files staged under it.
pub async fn detail(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(upload_id): Path<Uuid>,
) -> Result<Json<UploadDetail>, ApiError> {
    Ok(Json(state.models.upload_detail(&user, upload_id).await?))
}
