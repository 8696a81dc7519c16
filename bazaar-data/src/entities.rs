//! Row types, one per table.
//!
//! Enum-valued columns are stored as `TEXT`; each row type exposes typed
//! accessors over the raw strings so callers never match on column literals.

use bazaar_core::{Access, JobKind, LogLevel, ModelType, Permission, Status};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
}

/// Membership edge; at most one row per (user, team).
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct UserTeam {
    pub user_id: Uuid,
    pub team_id: Uuid,
    pub is_team_admin: bool,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Model {
    pub id: Uuid,
    pub user_id: Uuid,
    pub team_id: Option<Uuid>,
    pub name: String,
    pub model_type: String,
    pub train_status: String,
    pub deploy_status: String,
    pub access: String,
    pub default_permission: String,
    pub published_date: DateTime<Utc>,
    /// Lineage: the model this one was cloned or retrained from.
    pub base_model_id: Option<Uuid>,
}

impl Model {
    pub fn model_type(&self) -> Option<ModelType> {
        ModelType::parse(&self.model_type)
    }

    pub fn train_status(&self) -> Status {
        Status::parse(&self.train_status).unwrap_or(Status::Failed)
    }

    pub fn deploy_status(&self) -> Status {
        Status::parse(&self.deploy_status).unwrap_or(Status::Failed)
    }

    pub fn access(&self) -> Access {
        Access::parse(&self.access).unwrap_or(Access::Private)
    }

    pub fn default_permission(&self) -> Permission {
        Permission::parse(&self.default_permission).unwrap_or(Permission::Read)
    }
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct ModelAttribute {
    pub model_id: Uuid,
    pub key: String,
    pub value: String,
}

/// Composition edge; `position` fixes evaluation order.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct ModelDependency {
    pub model_id: Uuid,
    pub dependency_id: Uuid,
    pub position: i32,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Upload {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct JobLogEntry {
    pub id: i64,
    pub model_id: Uuid,
    pub job: String,
    pub level: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl JobLogEntry {
    pub fn job(&self) -> Option<JobKind> {
        JobKind::parse(&self.job)
    }

    pub fn level(&self) -> LogLevel {
        LogLevel::parse(&self.level).unwrap_or(LogLevel::Info)
    }
}

/// An API key row. The key itself is never stored; only its SHA-256 hash and
/// the display prefix survive creation.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct ApiKey {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing)]
    pub key_hash: String,
    pub prefix: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}
