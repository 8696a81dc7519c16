//! Typed parameter records for every job kind.
//!
//! A record carries everything a template needs; the renderers never reach
//! into global state. Fields that originate from user input (deployment
//! names, model names) are escaped at render time, not here.

use serde::{Deserialize, Serialize};

/// Environment shared by all templates: image selection, shared storage
/// mount, callback endpoint, and pass-through credentials.
#[derive(Clone, Debug)]
pub struct JobContext {
    /// Container registry prefix, e.g. `docker.io/modelbazaar`.
    pub registry: String,
    /// Image tag applied to every bundled image.
    pub tag: String,
    /// Scheduler driver hint (`docker`, `raw_exec`).
    pub driver: String,
    /// Absolute host path of the shared storage tree.
    pub share_dir: String,
    /// Endpoint jobs use to call back into the control plane.
    pub private_endpoint: String,
    /// Credentials forwarded into job environments, in a stable order.
    pub cloud_env: Vec<(String, String)>,
    /// Key for the generative-model services, when configured.
    pub genai_key: Option<String>,
}

/// CPU and memory a job asks the scheduler for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub cpu_mhz: u64,
    pub memory_mb: u64,
}

impl Default for ResourceRequest {
    fn default() -> Self {
        Self {
            cpu_mhz: 500,
            memory_mb: 800,
        }
    }
}

/// Declarative autoscaling policy; the orchestrator interprets it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoscalingPolicy {
    pub enabled: bool,
    pub min_allocations: u32,
    pub max_allocations: u32,
    pub target_cpu_percent: u32,
    pub cooldown_secs: u64,
    pub evaluation_interval_secs: u64,
}

impl Default for AutoscalingPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            min_allocations: 1,
            max_allocations: 1,
            target_cpu_percent: 70,
            cooldown_secs: 120,
            evaluation_interval_secs: 30,
        }
    }
}

/// Parameters for a one-shot training job.
#[derive(Clone, Debug)]
pub struct TrainJobParams {
    pub job_name: String,
    pub model_id: String,
    /// Relative path of the training config under the shared storage tree.
    pub config_path: String,
    pub resources: ResourceRequest,
    /// Data-generation variant of the trainer.
    pub datagen: bool,
    /// Token the job presents when reporting status and logs.
    pub job_token: String,
}

/// Parameters for a long-lived model deployment.
#[derive(Clone, Debug)]
pub struct DeployJobParams {
    pub job_name: String,
    pub model_id: String,
    /// Optional URL-friendly alias routed next to the model id.
    pub deployment_name: Option<String>,
    pub resources: ResourceRequest,
    pub autoscaling: AutoscalingPolicy,
    /// Token the deployment presents to `/deploy/update-status` and friends.
    pub job_token: String,
}

impl DeployJobParams {
    /// Route prefixes exposed for this deployment: always the model id, plus
    /// the alias when present.
    pub fn route_prefixes(&self) -> Vec<String> {
        let mut prefixes = vec![format!("/{}/", self.model_id)];
        if let Some(name) = &self.deployment_name {
            prefixes.push(format!("/{}/", crate::escape::sanitize_name(name)));
        }
        prefixes
    }

    /// Health-check path probed by the scheduler.
    pub fn health_path(&self) -> String {
        format!("/{}/health", self.model_id)
    }
}

/// Parameters for the periodic recovery snapshot job.
#[derive(Clone, Debug)]
pub struct RecoveryJobParams {
    pub job_name: String,
    /// Cron expression for the snapshot cadence.
    pub schedule: String,
    pub resources: ResourceRequest,
}

/// The bundled in-cluster services the control plane starts at boot.
///
/// Their internals are out of scope here; the catalog only knows their names,
/// images, and ports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SingletonService {
    LlmCache,
    LlmDispatch,
    Telemetry,
    Frontend,
    OnPremLlm,
}

impl SingletonService {
    pub const ALL: [SingletonService; 5] = [
        SingletonService::LlmCache,
        SingletonService::LlmDispatch,
        SingletonService::Telemetry,
        SingletonService::Frontend,
        SingletonService::OnPremLlm,
    ];

    /// Cluster-unique job name.
    pub fn job_name(&self) -> &'static str {
        match self {
            SingletonService::LlmCache => "llm-cache",
            SingletonService::LlmDispatch => "llm-dispatch",
            SingletonService::Telemetry => "telemetry",
            SingletonService::Frontend => "frontend",
            SingletonService::OnPremLlm => "onprem-llm",
        }
    }

    /// Image name under the configured registry.
    pub fn image(&self) -> &'static str {
        match self {
            SingletonService::LlmCache => "llm-cache",
            SingletonService::LlmDispatch => "llm-dispatch",
            SingletonService::Telemetry => "telemetry",
            SingletonService::Frontend => "frontend",
            SingletonService::OnPremLlm => "onprem-llm",
        }
    }

    /// Service port.
    pub fn port(&self) -> u16 {
        match self {
            SingletonService::LlmCache => 6174,
            SingletonService::LlmDispatch => 7601,
            SingletonService::Telemetry => 4318,
            SingletonService::Frontend => 3000,
            SingletonService::OnPremLlm => 8086,
        }
    }

    /// Whether the service needs the generative-model key in its environment.
    pub fn needs_genai_key(&self) -> bool {
        matches!(
            self,
            SingletonService::LlmDispatch | SingletonService::OnPremLlm
        )
    }
}
