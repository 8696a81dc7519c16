//! Route-surface tests: authentication gating and liveness, exercised
//! in-process through `tower::ServiceExt` without binding a port.
//!
//! The database pool is lazy and the orchestrator endpoint points at a
//! closed port, so only paths that never reach either can return success —
//! which is exactly what these tests pin down.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use sqlx::postgres::PgPoolOptions;
use tower::util::ServiceExt;

use bazaar_data::repositories::{
    ApiKeyRepository, JobLogRepository, ModelRepository, TeamRepository, UploadRepository,
    UserRepository,
};
use bazaar_jobs::{JobContext, JobTemplates, RenderBackend};
use bazaar_license::LicenseVerifier;
use bazaar_orchestrator::{NomadClient, Orchestrator};
use bazaar_security::{
    AuthState, IdentityProvider, JobTokenCodec, LocalIdentityProvider, UserTokenCodec,
};
use bazaar_service::{ApiKeyService, ModelService, TeamService, UserService};
use bazaar_storage::{LocalStorage, Storage};

use bazaar_server::routes;
use bazaar_server::state::AppState;

async fn test_app() -> (tempfile::TempDir, axum::Router) {
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(LocalStorage::new(dir.path()).await.unwrap());

    // Lazy pool: parses the URL, never connects unless a handler reaches it.
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://bazaar@127.0.0.1:1/bazaar")
        .unwrap();

    let users = UserRepository::new(pool.clone());
    let teams = TeamRepository::new(pool.clone());
    let models = ModelRepository::new(pool.clone());
    let uploads = UploadRepository::new(pool.clone());
    let job_logs = JobLogRepository::new(pool.clone());
    let api_keys = ApiKeyRepository::new(pool.clone());

    let user_tokens = UserTokenCodec::new("test-secret");
    let job_tokens = JobTokenCodec::new("test-secret");
    let provider: Arc<dyn IdentityProvider> =
        Arc::new(LocalIdentityProvider::new(users.clone(), user_tokens));

    // Closed port: every orchestrator call fails fast as a transport error.
    let orchestrator: Arc<dyn Orchestrator> = Arc::new(
        NomadClient::new("http://127.0.0.1:1", None, "bazaar.test").unwrap(),
    );

    let templates = JobTemplates::new(
        JobContext {
            registry: "registry.test".into(),
            tag: "test".into(),
            driver: "docker".into(),
            share_dir: dir.path().to_string_lossy().into_owned(),
            private_endpoint: "http://bazaar.test".into(),
            cloud_env: vec![],
            genai_key: None,
        },
        RenderBackend::Nomad,
    );

    let license_path = dir.path().join("license.json");
    let license = LicenseVerifier::new(license_path.to_string_lossy().into_owned()).unwrap();

    let model_service = Arc::new(ModelService::new(
        models.clone(),
        teams.clone(),
        uploads,
        job_logs,
        storage.clone(),
        orchestrator.clone(),
        templates,
        license,
        job_tokens.clone(),
    ));

    let app_state = AppState {
        auth: AuthState {
            provider: provider.clone(),
            api_keys: ApiKeyRepository::new(pool.clone()),
            users: users.clone(),
            job_tokens,
        },
        provider,
        models: model_service,
        teams: TeamService::new(teams),
        api_keys: ApiKeyService::new(api_keys),
        user_admin: UserService::new(users, models),
        orchestrator,
        storage,
        pool,
    };
    (dir, routes::router(app_state))
}

async fn send(router: &axum::Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn liveness_answers_without_dependencies() {
    let (_dir, router) = test_app().await;
    let request = Request::builder()
        .uri("/api/v2/health/live")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "UP");
}

#[tokio::test]
async fn model_routes_require_authentication() {
    let (_dir, router) = test_app().await;
    for uri in [
        "/api/v2/model/list",
        "/api/v2/train/00000000-0000-0000-0000-000000000000/status",
        "/api/v2/deploy/00000000-0000-0000-0000-000000000000/status",
    ] {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let (status, _) = send(&router, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
    }
}

#[tokio::test]
async fn garbage_bearer_tokens_are_rejected() {
    let (_dir, router) = test_app().await;
    let request = Request::builder()
        .uri("/api/v2/model/list")
        .header("authorization", "Bearer not-a-token")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn job_callbacks_require_job_auth_header() {
    let (_dir, router) = test_app().await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/v2/deploy/update-status")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"status":"complete"}"#))
        .unwrap();
    let (status, _) = send(&router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn user_tokens_do_not_pass_as_job_tokens() {
    let (_dir, router) = test_app().await;
    let (user_token, _) = UserTokenCodec::new("test-secret")
        .issue(uuid::Uuid::new_v4())
        .unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/api/v2/deploy/update-status")
        .header("content-type", "application/json")
        .header("x-job-auth", user_token)
        .body(Body::from(r#"{"status":"complete"}"#))
        .unwrap();
    let (status, _) = send(&router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_routes_are_404() {
    let (_dir, router) = test_app().await;
    let request = Request::builder()
        .uri("/api/v2/nope")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&router, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
