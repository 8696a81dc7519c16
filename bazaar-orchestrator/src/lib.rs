//! # bazaar-orchestrator — Cluster scheduler clients
//!
//! The control plane never talks to a scheduler directly; everything goes
//! through the [`Orchestrator`] trait so the lifecycle code stays
//! scheduler-agnostic. Two implementations live side by side:
//!
//! - [`NomadClient`] — jobs rendered to HCL are parsed and submitted through
//!   the scheduler's HTTP API.
//! - [`KubernetesClient`] — jobs rendered to manifests are applied
//!   imperatively through the API server (no CRD controller).
//!
//! One backend is selected at startup from configuration. Errors from either
//! backend are mapped onto [`OrchestratorError`] so callers can distinguish
//! "job not found" from transport failures without knowing which scheduler
//! is behind the trait.

mod error;
mod kubernetes;
mod nomad;
mod types;

pub use error::OrchestratorError;
pub use kubernetes::KubernetesClient;
pub use nomad::NomadClient;
pub use types::{
    AllocationLog, Job, JobInfo, JobPayload, JobStatus, ServiceAllocation, ServiceInfo,
};

/// Contract every scheduler backend satisfies.
#[async_trait::async_trait]
pub trait Orchestrator: Send + Sync {
    /// Submit a rendered job. Replaces a job of the same name if one exists.
    async fn start_job(&self, job: &Job) -> Result<(), OrchestratorError>;

    /// Request termination of a job. Returns [`OrchestratorError::JobNotFound`]
    /// distinctly; callers that want idempotent semantics ignore that kind.
    async fn stop_job(&self, name: &str) -> Result<(), OrchestratorError>;

    /// Current status of a job.
    async fn job_info(&self, name: &str) -> Result<JobInfo, OrchestratorError>;

    /// Stdout/stderr per running allocation of a job.
    async fn job_logs(&self, name: &str) -> Result<Vec<AllocationLog>, OrchestratorError>;

    /// Registered services and their allocations, for discovery of deployed
    /// models.
    async fn list_services(&self) -> Result<Vec<ServiceInfo>, OrchestratorError>;

    /// Sum of CPU shares across running allocations, in MHz.
    async fn total_cpu_usage(&self) -> Result<u64, OrchestratorError>;

    /// Hostname end users reach deployed models through.
    fn ingress_hostname(&self) -> &str;
}
