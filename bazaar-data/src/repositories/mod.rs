//! One repository per aggregate, each a thin typed layer over SQL.

mod api_keys;
mod job_logs;
mod models;
mod teams;
mod uploads;
mod users;

pub use api_keys::ApiKeyRepository;
pub use job_logs::JobLogRepository;
pub use models::{ModelRepository, NewModel};
pub use teams::TeamRepository;
pub use uploads::UploadRepository;
pub use users::UserRepository;
