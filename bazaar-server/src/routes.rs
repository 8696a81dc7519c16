use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{api_keys, auth, deploy, health, model, team, train, upload, user, workflow};
use crate::state::AppState;

/// The full `/api/v2` surface.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        // Identity
        .route("/login", post(auth::login))
        .route("/signup", post(auth::signup))
        // Health
        .route("/health", get(health::health))
        .route("/health/live", get(health::live))
        // Training
        .route("/train/{kind}", post(train::submit))
        .route("/train/{model_id}/status", get(train::status))
        .route("/train/{model_id}/logs", get(train::logs))
        .route("/train/{model_id}/logs/stream", get(train::stream))
        // Deployment
        .route("/deploy/update-status", post(deploy::update_status))
        .route("/deploy/log", post(deploy::append_log))
        .route(
            "/deploy/{model_id}",
            post(deploy::submit).delete(deploy::undeploy),
        )
        .route("/deploy/{model_id}/status", get(deploy::status))
        .route("/deploy/{model_id}/logs", get(deploy::logs))
        .route("/deploy/{model_id}/logs/stream", get(deploy::stream))
        .route("/deploy/{model_id}/endpoints", get(deploy::endpoints))
        .route("/deploy/{model_id}/save", post(deploy::save))
        // Composition workflows
        .route("/workflow/enterprise-search", post(workflow::enterprise_search))
        .route(
            "/workflow/knowledge-extraction",
            post(workflow::knowledge_extraction),
        )
        // Models
        .route("/model/list", get(model::list))
        .route("/model/upload", post(model::upload))
        .route("/model/{model_id}", get(model::detail).delete(model::delete))
        .route("/model/{model_id}/access", post(model::set_access))
        .route("/model/{model_id}/team", post(model::assign_team))
        .route("/model/{model_id}/permissions", post(model::grant))
        .route(
            "/model/{model_id}/permissions/{user_id}",
            delete(model::revoke),
        )
        .route("/model/{model_id}/download", get(model::download))
        // Uploads
        .route("/upload", post(upload::stage))
        .route("/upload/list", get(upload::list))
        .route("/upload/{upload_id}", get(upload::detail))
        // Users (admin)
        .route("/user/list", get(user::list))
        .route("/user/create", post(user::invite))
        .route("/user/{user_id}", delete(user::delete))
        .route("/user/{user_id}/admin", post(user::set_admin))
        // Teams
        .route("/team/create", post(team::create))
        .route("/team/list", get(team::list))
        .route("/team/{team_id}", delete(team::delete))
        .route("/team/{team_id}/users", get(team::members))
        .route(
            "/team/{team_id}/users/{user_id}",
            post(team::add_member).delete(team::remove_member),
        )
        // API keys
        .route("/api-key", post(api_keys::create))
        .route("/api-keys", get(api_keys::list))
        .route("/api-key/{key_id}", delete(api_keys::delete));

    Router::new()
        .nest("/api/v2", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
