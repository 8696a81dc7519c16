//! Request and response shapes shared by the service layer and the HTTP
//! façade.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bazaar_core::{Access, Permission, Status};
use bazaar_data::{Model, ModelAttribute, ModelDependency, Upload};

/// Body of `POST /train/{kind}`.
#[derive(Clone, Debug, Deserialize)]
pub struct TrainRequest {
    pub model_name: String,
    /// Staged upload groups consumed by this training run.
    #[serde(default)]
    pub upload_ids: Vec<Uuid>,
    /// Extra key/value attributes persisted on the model.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// CPU request in MHz.
    pub cpu: Option<u64>,
    /// Memory request in MiB.
    pub memory: Option<u64>,
    /// Run the data-generation variant of the trainer.
    #[serde(default)]
    pub datagen: bool,
}

/// Body of `POST /train/{kind}` for retrain kinds.
#[derive(Clone, Debug, Deserialize)]
pub struct RetrainRequest {
    pub base_model_id: Uuid,
    pub model_name: String,
}

/// Body of `POST /deploy/{model_id}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployRequest {
    pub deployment_name: Option<String>,
    #[serde(default)]
    pub autoscaling_enabled: bool,
    pub autoscaling_min: Option<u32>,
    pub autoscaling_max: Option<u32>,
    /// Memory request in MiB.
    pub memory: Option<u64>,
}

/// Status payload for train and deploy status endpoints.
#[derive(Clone, Debug, Serialize)]
pub struct StatusResponse {
    pub status: Status,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// One allocation's captured output.
#[derive(Clone, Debug, Serialize)]
pub struct AllocationLogs {
    pub alloc_id: String,
    pub stdout: String,
    pub stderr: String,
}

/// Body of `POST /deploy/{model_id}/save`.
#[derive(Clone, Debug, Deserialize)]
pub struct SaveRequest {
    pub model_name: String,
}

/// Response of `POST /deploy/{model_id}/save`.
#[derive(Clone, Debug, Serialize)]
pub struct SaveResponse {
    pub model_id: Uuid,
    pub update_token: String,
}

/// Body of `POST /deploy/update-status` (job-auth).
#[derive(Clone, Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Body of `POST /deploy/log` (job-auth).
#[derive(Clone, Debug, Deserialize)]
pub struct JobLogRequest {
    pub level: String,
    pub message: String,
}

/// Body of the workflow composition endpoints.
#[derive(Clone, Debug, Deserialize)]
pub struct ComposeRequest {
    pub model_name: String,
    /// Component models in evaluation order (retriever before guardrail
    /// before generator).
    pub dependencies: Vec<Uuid>,
    /// Client-supplied id, for idempotent creation.
    pub model_id: Option<Uuid>,
    pub access: Option<Access>,
}

/// Body of `POST /model/{id}/access`.
#[derive(Clone, Debug, Deserialize)]
pub struct AccessRequest {
    pub access: Access,
    pub default_permission: Option<Permission>,
}

/// Full model view returned by detail endpoints.
#[derive(Clone, Debug, Serialize)]
pub struct ModelDetail {
    #[serde(flatten)]
    pub model: Model,
    pub attributes: Vec<ModelAttribute>,
    pub dependencies: Vec<ModelDependency>,
    /// Artifact tree size, once training has produced one.
    pub size_bytes: Option<u64>,
}

/// One live endpoint of a deployed model, from service discovery.
#[derive(Clone, Debug, Serialize)]
pub struct DeploymentEndpoint {
    /// In-cluster address of the allocation.
    pub internal_address: String,
    /// URL end users reach this deployment through.
    pub public_url: String,
    pub alloc_id: String,
    pub node_id: String,
}

/// An upload with the files staged under it.
#[derive(Clone, Debug, Serialize)]
pub struct UploadDetail {
    #[serde(flatten)]
    pub upload: Upload,
    pub files: Vec<String>,
}
