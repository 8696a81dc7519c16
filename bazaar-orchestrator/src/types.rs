use serde::{Deserialize, Serialize};

/// A job ready for submission: a cluster-unique name plus the payload the
/// selected backend understands.
#[derive(Clone, Debug)]
pub struct Job {
    pub name: String,
    pub payload: JobPayload,
}

/// Backend-specific rendering of a job definition.
///
/// The template catalog renders exactly one of these per job, matching the
/// backend picked at startup. Handing the wrong variant to a client is an
/// [`InvalidJob`](crate::OrchestratorError::InvalidJob) error, not a panic.
#[derive(Clone, Debug)]
pub enum JobPayload {
    /// HCL job description for the Nomad-like backend.
    Hcl(String),
    /// Manifest documents for the Kubernetes-like backend, applied in order.
    Manifests(Vec<serde_json::Value>),
}

/// Scheduler-reported lifecycle state of a job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted but not yet placed.
    Pending,
    /// At least one allocation is running.
    Running,
    /// All allocations finished; `failed` distinguishes outcome.
    Dead { failed: bool },
}

/// Status snapshot for one job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobInfo {
    pub name: String,
    pub status: JobStatus,
}

/// Captured output of one allocation.
#[derive(Clone, Debug, Default)]
pub struct AllocationLog {
    pub alloc_id: String,
    pub stdout: String,
    pub stderr: String,
}

/// One placed instance of a registered service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAllocation {
    pub address: String,
    pub port: u16,
    pub alloc_id: String,
    pub node_id: String,
}

/// A service registered with the scheduler, with its live allocations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub allocations: Vec<ServiceAllocation>,
}
