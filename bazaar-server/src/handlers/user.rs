use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use bazaar_core::ApiError;
use bazaar_data::User;
use bazaar_security::AuthenticatedUser;

use crate::state::AppState;

pub async fn list(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.user_admin.list(&user).await?))
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

pub async fn invite(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<InviteRequest>,
) -> Result<Json<User>, ApiError> {
    let invited = state
        .user_admin
        .invite(&user, &body.username, &body.email, &body.password)
        .await?;
    Ok(Json(invited))
}

pub async fn delete(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.user_admin.delete(&user, user_id).await?;
    Ok(Json(json!({})))
}

#[derive(Debug, Deserialize)]
pub struct AdminFlagRequest {
    pub is_admin: bool,
}

pub async fn set_admin(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(user_id): Path<Uuid>,
    Json(body): Json<AdminFlagRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.user_admin.set_admin(&user, user_id, body.is_admin).await?;
    Ok(Json(json!({})))
}
