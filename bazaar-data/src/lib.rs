//! # bazaar-data — Relational persistence for the control plane
//!
//! All durable state — users, teams, models and their lineage, uploads, job
//! logs, API keys — lives in Postgres behind the repositories in this crate.
//!
//! Repositories follow one shape: a cheap-to-clone struct wrapping a
//! [`sqlx::PgPool`], one method per query. Methods that must run inside a
//! caller-owned transaction (row-locked lifecycle transitions, multi-row
//! creates) take `&mut PgTransaction` explicitly; everything else goes
//! straight through the pool.
//!
//! Driver errors never leak: every method returns [`DataError`], with unique
//! violations mapped to `Conflict` and missing rows to `NotFound`.

mod entities;
mod error;
mod schema;

pub mod repositories;

pub use entities::{
    ApiKey, JobLogEntry, Model, ModelAttribute, ModelDependency, Team, Upload, User, UserTeam,
};
pub use error::{DataError, SqlxErrorExt};
pub use schema::init_schema;

/// A Postgres transaction, as passed to repository methods that need one.
pub type PgTransaction<'a> = sqlx::Transaction<'a, sqlx::Postgres>;
