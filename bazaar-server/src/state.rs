use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use bazaar_orchestrator::Orchestrator;
use bazaar_security::{AuthState, IdentityProvider};
use bazaar_service::{ApiKeyService, ModelService, TeamService, UserService};
use bazaar_storage::Storage;

/// The root object graph, assembled once in `main` and cloned into handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthState,
    pub provider: Arc<dyn IdentityProvider>,
    pub models: Arc<ModelService>,
    pub teams: TeamService,
    pub api_keys: ApiKeyService,
    pub user_admin: UserService,
    pub orchestrator: Arc<dyn Orchestrator>,
    pub storage: Arc<dyn Storage>,
    pub pool: PgPool,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}
