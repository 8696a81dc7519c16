//! Mapping of collaborator errors onto the API taxonomy.
//!
//! Free functions rather than `From` impls: both sides of each conversion
//! live in other crates, so the orphan rule forbids the trait form.

use bazaar_core::ApiError;
use bazaar_license::LicenseError;
use bazaar_orchestrator::OrchestratorError;
use bazaar_storage::StorageError;

use crate::lifecycle::TransitionError;

pub fn storage(err: StorageError) -> ApiError {
    match err {
        StorageError::NotFound(path) => ApiError::NotFound(format!("no such file: {path}")),
        StorageError::InvalidPath(path) => ApiError::InvalidRequest(format!("invalid path: {path}")),
        other => ApiError::Internal(other.to_string()),
    }
}

pub fn orchestrator(err: OrchestratorError) -> ApiError {
    match err {
        OrchestratorError::JobNotFound(name) => ApiError::NotFound(format!("job {name}")),
        OrchestratorError::InvalidJob(msg) => ApiError::Internal(msg),
        other => ApiError::DependencyUnavailable(other.to_string()),
    }
}

pub fn license(err: LicenseError) -> ApiError {
    // Every license failure blocks admission the same way; the message keeps
    // the kinds distinguishable.
    ApiError::FailedPrecondition(err.to_string())
}

pub fn transition(err: TransitionError) -> ApiError {
    match err {
        TransitionError::NotTrained { .. } => ApiError::FailedPrecondition(err.to_string()),
        TransitionError::InvalidState { .. } => ApiError::Conflict(err.to_string()),
    }
}
