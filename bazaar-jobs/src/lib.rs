//! # bazaar-jobs — Declarative job templates
//!
//! Every background job the control plane launches — training runs, model
//! deployments, recovery snapshots, and the bundled singleton services — is
//! described by a strongly typed parameter record in [`params`]. A record is
//! rendered into the selected backend's native job description by
//! [`JobTemplates`]: HCL for the Nomad-like scheduler, manifest documents for
//! the Kubernetes-like one.
//!
//! Rendering is a pure function of the parameters; the same record always
//! produces the same payload. Missing parameters are impossible by
//! construction (they are struct fields, not template holes), and every
//! user-supplied string is escaped before it reaches template output.

mod escape;
mod hcl;
mod manifest;
pub mod params;

pub use escape::{escape_hcl, sanitize_name};
pub use params::{
    AutoscalingPolicy, DeployJobParams, JobContext, RecoveryJobParams, ResourceRequest,
    SingletonService, TrainJobParams,
};

use bazaar_orchestrator::{Job, JobPayload};

/// Which backend the catalog renders for.
#[derive(Clone, Debug)]
pub enum RenderBackend {
    Nomad,
    Kubernetes { namespace: String },
}

/// The job template catalog, bound to one backend and one environment.
#[derive(Clone, Debug)]
pub struct JobTemplates {
    context: JobContext,
    backend: RenderBackend,
}

impl JobTemplates {
    pub fn new(context: JobContext, backend: RenderBackend) -> Self {
        Self { context, backend }
    }

    pub fn context(&self) -> &JobContext {
        &self.context
    }

    /// One-shot training job bound to a model-scoped config file on shared
    /// storage.
    pub fn train_job(&self, params: &TrainJobParams) -> Job {
        let payload = match &self.backend {
            RenderBackend::Nomad => JobPayload::Hcl(hcl::render_train(&self.context, params)),
            RenderBackend::Kubernetes { namespace } => {
                JobPayload::Manifests(manifest::render_train(&self.context, params, namespace))
            }
        };
        Job {
            name: params.job_name.clone(),
            payload,
        }
    }

    /// Long-lived service exposing a trained model, with routing and
    /// autoscaling policy.
    pub fn deploy_job(&self, params: &DeployJobParams) -> Job {
        let payload = match &self.backend {
            RenderBackend::Nomad => JobPayload::Hcl(hcl::render_deploy(&self.context, params)),
            RenderBackend::Kubernetes { namespace } => {
                JobPayload::Manifests(manifest::render_deploy(&self.context, params, namespace))
            }
        };
        Job {
            name: params.job_name.clone(),
            payload,
        }
    }

    /// Periodic batch job snapshotting the database and storage tree.
    pub fn recovery_job(&self, params: &RecoveryJobParams) -> Job {
        let payload = match &self.backend {
            RenderBackend::Nomad => JobPayload::Hcl(hcl::render_recovery(&self.context, params)),
            RenderBackend::Kubernetes { namespace } => {
                JobPayload::Manifests(manifest::render_recovery(&self.context, params, namespace))
            }
        };
        Job {
            name: params.job_name.clone(),
            payload,
        }
    }

    /// One of the bundled singleton services, started once at control-plane
    /// startup.
    pub fn singleton_job(&self, service: SingletonService) -> Job {
        let payload = match &self.backend {
            RenderBackend::Nomad => JobPayload::Hcl(hcl::render_singleton(&self.context, service)),
            RenderBackend::Kubernetes { namespace } => {
                JobPayload::Manifests(manifest::render_singleton(&self.context, service, namespace))
            }
        };
        Job {
            name: service.job_name().to_string(),
            payload,
        }
    }
}
