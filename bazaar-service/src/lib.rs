//! # bazaar-service — The lifecycle core and its reconciler
//!
//! This crate owns everything between the HTTP façade and the
//! infrastructure crates:
//!
//! - [`ModelService`] — train, deploy, undeploy, retrain, save, delete, and
//!   composition, with every transition guard run inside a row-locked
//!   transaction and all file/orchestrator I/O kept outside it.
//! - [`StatusSynchronizer`] — the periodic background task reconciling
//!   orchestrator job state into the database.
//! - [`TeamService`] / [`ApiKeyService`] — team membership and API key
//!   management.
//! - [`lifecycle`] — the state machine itself, as pure functions.

pub mod lifecycle;
pub mod paths;
pub mod types;

mod api_key_service;
mod convert;
mod model_service;
mod platform;
mod sync;
mod team_service;
mod user_service;

pub use api_key_service::ApiKeyService;
pub use model_service::ModelService;
pub use platform::start_platform_services;
pub use sync::StatusSynchronizer;
pub use team_service::TeamService;
pub use user_service::UserService;
