//! # bazaar-core — Shared foundations of the Model Bazaar control plane
//!
//! This crate holds the pieces every other crate in the workspace agrees on:
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | The [`ApiError`] taxonomy and its HTTP mapping |
//! | [`config`] | Env-driven [`AppConfig`] recognized by the binary |
//! | [`types`] | Model/job enums shared across the data and service layers |
//! | [`retry`] | The retry-once-with-jitter policy for transient failures |
//!
//! Nothing in here touches the database, the orchestrator, or the filesystem.

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

pub use config::{AppConfig, ConfigError, IdentityBackend, OrchestratorBackend};
pub use error::ApiError;
pub use retry::retry_once;
pub use types::{Access, JobKind, LogLevel, ModelType, Permission, Status};

/// Initialize the global tracing subscriber with env-filter support.
///
/// Reads `RUST_LOG` (default `info`). Call once at the top of `main`.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();
}
