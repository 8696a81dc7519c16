use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use bazaar_core::ApiError;
use bazaar_security::IssuedToken;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<IssuedToken>, ApiError> {
    let token = state.provider.login(&body.username, &body.password).await?;
    Ok(Json(token))
}

pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<SignupRequest>,
) -> Result<Json<IssuedToken>, ApiError> {
    if body.username.trim().is_empty() || body.email.trim().is_empty() {
        return Err(ApiError::InvalidRequest(
            "username and email are required".into(),
        ));
    }
    let token = state
        .provider
        .signup(&body.username, &body.email, &body.password)
        .await?;
    Ok(Json(token))
}
