use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use bazaar_core::ApiError;
use bazaar_data::ApiKey;
use bazaar_security::AuthenticatedUser;

use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CreateKeyRequest {
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub allowed_models: Vec<Uuid>,
}

/// The plaintext key appears in this response and nowhere else.
pub async fn create(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    body: Option<Json<CreateKeyRequest>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let (key, plaintext) = state
        .api_keys
        .create(&user, body.expires_at, body.allowed_models)
        .await?;
    Ok(Json(json!({
        "id": key.id,
        "key": plaintext,
        "prefix": key.prefix,
        "expires_at": key.expires_at,
    })))
}

pub async fn list(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<ApiKey>>, ApiError> {
    Ok(Json(state.api_keys.list(&user).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(key_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.api_keys.delete(&user, key_id).await?;
    Ok(Json(json!({})))
}
