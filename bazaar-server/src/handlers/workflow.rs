use axum::extract::State;
use axum::Json;
use serde_json::json;

use bazaar_core::{ApiError, ModelType};
use bazaar_security::AuthenticatedUser;
use bazaar_service::types::ComposeRequest;

use crate::state::AppState;

/// `POST /workflow/enterprise-search` — compose a retriever (and optional
/// guardrail) into an enterprise-search model.
pub async fn enterprise_search(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<ComposeRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let model = state
        .models
        .create_composed(&user, ModelType::EnterpriseSearch, body)
        .await?;
    Ok(Json(json!({ "model_id": model.id })))
}

/// `POST /workflow/knowledge-extraction`.
pub async fn knowledge_extraction(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<ComposeRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let model = state
        .models
        .create_composed(&user, ModelType::KnowledgeExtraction, body)
        .await?;
    Ok(Json(json!({ "model_id": model.id })))
}
