use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use bazaar_core::ApiError;
use bazaar_data::{Team, UserTeam};
use bazaar_security::AuthenticatedUser;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub name: String,
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateTeamRequest>,
) -> Result<Json<Team>, ApiError> {
    Ok(Json(state.teams.create(&user, &body.name).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(team_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.teams.delete(&user, team_id).await?;
    Ok(Json(json!({})))
}

pub async fn list(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Team>>, ApiError> {
    Ok(Json(state.teams.list(&user).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct AddMemberRequest {
    #[serde(default)]
    pub team_admin: bool,
}

pub async fn add_member(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((team_id, member_id)): Path<(Uuid, Uuid)>,
    body: Option<Json<AddMemberRequest>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let team_admin = body.map(|Json(b)| b.team_admin).unwrap_or(false);
    state
        .teams
        .add_member(&user, team_id, member_id, team_admin)
        .await?;
    Ok(Json(json!({})))
}

pub async fn remove_member(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((team_id, member_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.teams.remove_member(&user, team_id, member_id).await?;
    Ok(Json(json!({})))
}

pub async fn members(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(team_id): Path<Uuid>,
) -> Result<Json<Vec<UserTeam>>, ApiError> {
    Ok(Json(state.teams.members(&user, team_id).await?))
}
