//! Schema bootstrap, executed once at startup.
//!
//! Statements are idempotent so a restart against an existing database is a
//! no-op. Cascade rules mirror the ownership model: attributes, dependencies,
//! logs, and permissions die with their model; memberships and API keys die
//! with their user; models do *not* die with their user and must be
//! transferred or deleted explicitly.

use sqlx::PgPool;

use crate::error::{DataError, SqlxErrorExt};

const STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT,
        is_admin BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS teams (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS user_teams (
        user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        team_id UUID NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
        is_team_admin BOOLEAN NOT NULL DEFAULT FALSE,
        PRIMARY KEY (user_id, team_id)
    )",
    "CREATE TABLE IF NOT EXISTS models (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users(id),
        team_id UUID REFERENCES teams(id) ON DELETE SET NULL,
        name TEXT NOT NULL,
        model_type TEXT NOT NULL,
        train_status TEXT NOT NULL,
        deploy_status TEXT NOT NULL,
        access TEXT NOT NULL,
        default_permission TEXT NOT NULL,
        published_date TIMESTAMPTZ NOT NULL DEFAULT now(),
        base_model_id UUID REFERENCES models(id),
        UNIQUE (user_id, name)
    )",
    "CREATE TABLE IF NOT EXISTS model_attributes (
        model_id UUID NOT NULL REFERENCES models(id) ON DELETE CASCADE,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        PRIMARY KEY (model_id, key)
    )",
    "CREATE TABLE IF NOT EXISTS model_dependencies (
        model_id UUID NOT NULL REFERENCES models(id) ON DELETE CASCADE,
        dependency_id UUID NOT NULL REFERENCES models(id),
        position INT NOT NULL,
        PRIMARY KEY (model_id, dependency_id)
    )",
    "CREATE TABLE IF NOT EXISTS model_permissions (
        model_id UUID NOT NULL REFERENCES models(id) ON DELETE CASCADE,
        user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        permission TEXT NOT NULL,
        PRIMARY KEY (model_id, user_id)
    )",
    "CREATE TABLE IF NOT EXISTS uploads (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS job_logs (
        id BIGSERIAL PRIMARY KEY,
        model_id UUID NOT NULL REFERENCES models(id) ON DELETE CASCADE,
        job TEXT NOT NULL,
        level TEXT NOT NULL,
        message TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS api_keys (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        key_hash TEXT NOT NULL,
        prefix TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        expires_at TIMESTAMPTZ
    )",
    "CREATE TABLE IF NOT EXISTS api_key_models (
        api_key_id UUID NOT NULL REFERENCES api_keys(id) ON DELETE CASCADE,
        model_id UUID NOT NULL REFERENCES models(id) ON DELETE CASCADE,
        PRIMARY KEY (api_key_id, model_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_models_user ON models(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_models_statuses ON models(train_status, deploy_status)",
    "CREATE INDEX IF NOT EXISTS idx_job_logs_model ON job_logs(model_id)",
    "CREATE INDEX IF NOT EXISTS idx_api_keys_prefix ON api_keys(prefix)",
];

/// Create all tables and indexes if they do not exist.
pub async fn init_schema(pool: &PgPool) -> Result<(), DataError> {
    for statement in STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| e.into_data_error())?;
    }
    tracing::info!(tables = STATEMENTS.len(), "schema initialized");
    Ok(())
}
