use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

/// Aggregated health: the database, the orchestrator, and shared storage
/// must all answer. Storage reports free space alongside its status.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let db_up = sqlx::query("SELECT 1").fetch_one(&state.pool).await.is_ok();
    let orchestrator_up = state.orchestrator.total_cpu_usage().await.is_ok();
    let storage_usage = state.storage.usage().await.ok();

    let up = db_up && orchestrator_up && storage_usage.is_some();
    let status = if up { "UP" } else { "DOWN" };
    let code = if up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        code,
        Json(json!({
            "status": status,
            "checks": {
                "db": if db_up { "UP" } else { "DOWN" },
                "orchestrator": if orchestrator_up { "UP" } else { "DOWN" },
                "storage": match storage_usage {
                    Some(usage) => json!({
                        "status": "UP",
                        "total_bytes": usage.total_bytes,
                        "free_bytes": usage.free_bytes,
                    }),
                    None => json!({ "status": "DOWN" }),
                },
            }
        })),
    )
}

/// Liveness probe: the process answers, nothing else is checked.
pub async fn live() -> Json<serde_json::Value> {
    Json(json!({ "status": "UP" }))
}
