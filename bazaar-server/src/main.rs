//! Control-plane binary: configuration, object graph, background tasks, and
//! the HTTP server.
//!
//! Exit status: 0 on clean shutdown; non-zero when initialization fails
//! (missing env, invalid license, unreachable database). After startup,
//! nothing short of those is fatal — transient collaborator failures surface
//! as 503s and the synchronizer keeps reconciling.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use bazaar_core::{AppConfig, IdentityBackend, OrchestratorBackend};
use bazaar_data::repositories::{
    ApiKeyRepository, JobLogRepository, ModelRepository, TeamRepository, UploadRepository,
    UserRepository,
};
use bazaar_jobs::{JobContext, JobTemplates, RenderBackend};
use bazaar_license::LicenseVerifier;
use bazaar_orchestrator::{KubernetesClient, NomadClient, Orchestrator};
use bazaar_security::{
    AuthState, IdentityProvider, JobTokenCodec, KeycloakIdentityProvider, LocalIdentityProvider,
    UserTokenCodec,
};
use bazaar_service::{
    start_platform_services, ApiKeyService, ModelService, StatusSynchronizer, TeamService,
    UserService,
};
use bazaar_storage::{LocalStorage, Storage};

use bazaar_server::state::AppState;
use bazaar_server::routes;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    bazaar_core::init_tracing();

    if let Err(err) = run().await {
        error!(error = %err, "fatal initialization error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;

    // Storage and license come first: both are required before any job can
    // ever be admitted.
    let storage: Arc<dyn Storage> = Arc::new(LocalStorage::new(config.share_dir.clone()).await?);
    let license = LicenseVerifier::new(config.license_path.clone())?;
    let verified = license.verify(0).await?;
    info!(
        licensee = %verified.licensee,
        cpu_mhz_limit = verified.cpu_mhz_limit,
        "license verified"
    );

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_uri)
        .await?;
    bazaar_data::init_schema(&pool).await?;

    let users = UserRepository::new(pool.clone());
    let teams = TeamRepository::new(pool.clone());
    let models = ModelRepository::new(pool.clone());
    let uploads = UploadRepository::new(pool.clone());
    let job_logs = JobLogRepository::new(pool.clone());
    let api_keys = ApiKeyRepository::new(pool.clone());

    // The local provider always exists: it hashes passwords and bootstraps
    // the admin account, even when logins are federated.
    let user_tokens = UserTokenCodec::new(&config.jwt_secret);
    let local_provider = LocalIdentityProvider::new(users.clone(), user_tokens);
    local_provider
        .ensure_admin(
            &config.admin_username,
            &config.admin_mail,
            &config.admin_password,
        )
        .await?;
    let provider: Arc<dyn IdentityProvider> = match &config.identity_backend {
        IdentityBackend::Local => Arc::new(local_provider),
        IdentityBackend::Keycloak {
            server_url,
            realm,
            client_id,
        } => Arc::new(KeycloakIdentityProvider::new(
            users.clone(),
            server_url,
            realm,
            client_id,
        )?),
    };

    let ingress_hostname = url::Url::parse(&config.public_endpoint)
        .ok()
        .and_then(|u| u.host_str().map(String::from))
        .unwrap_or_else(|| config.public_endpoint.clone());
    let (orchestrator, render_backend): (Arc<dyn Orchestrator>, RenderBackend) =
        match &config.orchestrator_backend {
            OrchestratorBackend::Nomad => (
                Arc::new(NomadClient::new(
                    config.orchestrator_endpoint.clone(),
                    config.orchestrator_token.clone(),
                    ingress_hostname,
                )?),
                RenderBackend::Nomad,
            ),
            OrchestratorBackend::Kubernetes { namespace } => (
                Arc::new(KubernetesClient::new(
                    config.orchestrator_endpoint.clone(),
                    config.orchestrator_token.clone(),
                    namespace.clone(),
                    ingress_hostname,
                )?),
                RenderBackend::Kubernetes {
                    namespace: namespace.clone(),
                },
            ),
        };

    let templates = JobTemplates::new(
        JobContext {
            registry: config.image.registry.clone(),
            tag: config.image.tag.clone(),
            driver: config.image.driver.clone(),
            share_dir: storage.location().to_string(),
            private_endpoint: config.private_endpoint.clone(),
            cloud_env: config
                .cloud
                .as_env()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            genai_key: config.genai_key.clone(),
        },
        render_backend,
    );

    let job_tokens = JobTokenCodec::new(&config.jwt_secret);
    let model_service = Arc::new(ModelService::new(
        models.clone(),
        teams.clone(),
        uploads,
        job_logs.clone(),
        storage.clone(),
        orchestrator.clone(),
        templates.clone(),
        license,
        job_tokens.clone(),
    ));

    // Bundled services are idempotent to start; a failure here is a degraded
    // cluster, not a dead control plane.
    if let Err(err) = start_platform_services(&orchestrator, &templates).await {
        warn!(error = %err, "platform services did not all start");
    }

    let cancel = CancellationToken::new();
    let synchronizer = Arc::new(StatusSynchronizer::new(
        models.clone(),
        job_logs,
        orchestrator.clone(),
        config.sync_interval,
    ));
    let sync_task = synchronizer.spawn(cancel.clone());

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

    let router = routes::router(app_state);
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "model bazaar listening");

    let shutdown_cancel = cancel.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_cancel.cancel();
        })
        .await?;

    // Let the synchronizer drain its in-flight tick before exiting cleanly.
    cancel.cancel();
    let _ = sync_task.await;
    info!("clean shutdown");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
