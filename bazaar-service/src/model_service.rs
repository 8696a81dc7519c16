//! The model lifecycle core.
//!
//! Every operation follows the same shape: resolve permissions, run the
//! transition guard inside a row-locked transaction, commit, then perform
//! orchestrator and storage I/O outside the transaction. Submission failures
//! after commit are reconciled by compare-and-set back to `failed`, so the
//! database never claims a job that was never accepted.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use bazaar_core::{retry_once, Access, ApiError, JobKind, LogLevel, ModelType, Permission, Status};
use bazaar_data::repositories::{
    JobLogRepository, ModelRepository, NewModel, TeamRepository, UploadRepository,
};
use bazaar_data::{Model, SqlxErrorExt, Upload};
use bazaar_jobs::{
    AutoscalingPolicy, DeployJobParams, JobTemplates, ResourceRequest, TrainJobParams,
};
use bazaar_license::LicenseVerifier;
use bazaar_orchestrator::{Orchestrator, OrchestratorError};
use bazaar_security::{
    evaluate_permission, AuthenticatedUser, JobClaims, JobTokenCodec, PermissionInput,
};
use bazaar_storage::{ByteStream, Storage};

use crate::convert;
use crate::lifecycle::{
    guard_delete, guard_deploy_submit, guard_retrain, guard_train_submit, guard_undeploy,
};
use crate::paths;
use crate::types::{
    AllocationLogs, ComposeRequest, DeployRequest, DeploymentEndpoint, ModelDetail, SaveRequest,
    SaveResponse, StatusResponse, TrainRequest, UpdateStatusRequest, UploadDetail,
};

/// Attribute key holding the normalized deploy parameters, for idempotency
/// comparison on resubmission.
const DEPLOY_PARAMS_ATTR: &str = "deploy_params";
/// Attribute keys never copied onto retrained or saved models.
const PRIVATE_ATTRS: &[&str] = &[DEPLOY_PARAMS_ATTR];

const TRAIN_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;
const DEPLOY_TOKEN_TTL_SECS: i64 = 30 * 24 * 60 * 60;
const UPDATE_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

const DEFAULT_TRAIN_CPU_MHZ: u64 = 1000;
const DEFAULT_DEPLOY_CPU_MHZ: u64 = 500;

/// Control-plane audit trail on shared storage.
const AUDIT_LOG_PATH: &str = "logs/audit.log";

pub struct ModelService {
    models: ModelRepository,
    teams: TeamRepository,
    uploads: UploadRepository,
    job_logs: JobLogRepository,
    storage: Arc<dyn Storage>,
    orchestrator: Arc<dyn Orchestrator>,
    templates: JobTemplates,
    license: LicenseVerifier,
    job_tokens: JobTokenCodec,
}

impl ModelService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        models: ModelRepository,
        teams: TeamRepository,
        uploads: UploadRepository,
        job_logs: JobLogRepository,
        storage: Arc<dyn Storage>,
        orchestrator: Arc<dyn Orchestrator>,
        templates: JobTemplates,
        license: LicenseVerifier,
        job_tokens: JobTokenCodec,
    ) -> Self {
        Self {
            models,
            teams,
            uploads,
            job_logs,
            storage,
            orchestrator,
            templates,
            license,
            job_tokens,
        }
    }

    // ── Permissions ───────────────────────────────────────────────────────

    async fn permission_for(
        &self,
        user: &AuthenticatedUser,
        model: &Model,
    ) -> Result<Option<Permission>, ApiError> {
        let memberships = self.teams.memberships(user.id).await?;
        let granted = self.models.granted_permission(model.id, user.id).await?;
        Ok(evaluate_permission(&PermissionInput {
            user,
            model,
            memberships: &memberships,
            granted,
        }))
    }

    async fn load_for_read(
        &self,
        user: &AuthenticatedUser,
        model_id: Uuid,
    ) -> Result<Model, ApiError> {
        let model = self.models.find(model_id).await?;
        match self.permission_for(user, &model).await? {
            // A model the caller cannot see at all reads as absent.
            None => Err(ApiError::NotFound(format!("model {model_id}"))),
            Some(_) => Ok(model),
        }
    }

    fn ensure_owner(user: &AuthenticatedUser, model: &Model) -> Result<(), ApiError> {
        // Scoped API keys see nothing outside their scope, owner or not.
        if !user.in_scope(model.id) {
            return Err(ApiError::NotFound(format!("model {}", model.id)));
        }
        if user.is_admin || model.user_id == user.id {
            Ok(())
        } else {
            Err(ApiError::Forbidden("only the owner may do this".into()))
        }
    }

    /// Creation requires a full credential; a model-scoped API key cannot
    /// mint resources its scope could never name.
    fn ensure_can_create(user: &AuthenticatedUser) -> Result<(), ApiError> {
        if user.can_create() {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "api key is scoped to specific models".into(),
            ))
        }
    }

    /// Append one line to the audit trail. Failures degrade to a warning;
    /// the operation itself already succeeded.
    async fn audit(&self, user: &AuthenticatedUser, action: &str, model_id: Uuid) {
        let line = format!(
            "{} {} {action} {model_id}\n",
            chrono::Utc::now().to_rfc3339(),
            user.username
        );
        if let Err(err) = self.storage.append(AUDIT_LOG_PATH, Bytes::from(line)).await {
            warn!(error = %err, "audit log append failed");
        }
    }

    // ── Admission ─────────────────────────────────────────────────────────

    /// License gate run before any train or deploy job: current cluster
    /// usage plus the new job's request must fit under the licensed ceiling.
    async fn admit(&self, requested_cpu_mhz: u64) -> Result<(), ApiError> {
        let current = retry_once(|| self.orchestrator.total_cpu_usage())
            .await
            .map_err(convert::orchestrator)?;
        self.license
            .verify(current + requested_cpu_mhz)
            .await
            .map_err(convert::license)?;
        Ok(())
    }

    // ── Create & train ────────────────────────────────────────────────────

    async fn ensure_name_free(&self, user_id: Uuid, name: &str) -> Result<(), ApiError> {
        if name.trim().is_empty() {
            return Err(ApiError::InvalidRequest("model name must not be empty".into()));
        }
        if self
            .models
            .find_by_owner_and_name(user_id, name)
            .await?
            .is_some()
        {
            return Err(ApiError::Conflict(format!("model name '{name}' already in use")));
        }
        Ok(())
    }

    /// Uploads must exist and belong to the caller before they are consumed.
    async fn claim_uploads(
        &self,
        user: &AuthenticatedUser,
        upload_ids: &[Uuid],
    ) -> Result<Vec<Upload>, ApiError> {
        let mut claimed = Vec::with_capacity(upload_ids.len());
        for id in upload_ids {
            let upload = self.uploads.find(*id).await?;
            if upload.user_id != user.id {
                return Err(ApiError::Forbidden(format!("upload {id} is not yours")));
            }
            claimed.push(upload);
        }
        Ok(claimed)
    }

    /// Submit a training job for a fresh model.
    pub async fn submit_train(
        &self,
        user: &AuthenticatedUser,
        model_type: ModelType,
        request: TrainRequest,
    ) -> Result<Model, ApiError> {
        if model_type.is_composed() {
            return Err(ApiError::InvalidRequest(format!(
                "{} models are created through the workflow endpoints",
                model_type.as_str()
            )));
        }
        Self::ensure_can_create(user)?;
        let cpu = request.cpu.unwrap_or(DEFAULT_TRAIN_CPU_MHZ);
        self.ensure_name_free(user.id, &request.model_name).await?;
        self.admit(cpu).await?;
        let uploads = self.claim_uploads(user, &request.upload_ids).await?;

        // Create the row and take the first transition in one transaction.
        let mut tx = self.models.pool().begin().await.map_err(|e| e.into_data_error())?;
        let model = self
            .models
            .create(
                &mut tx,
                &NewModel {
                    id: Uuid::new_v4(),
                    user_id: user.id,
                    team_id: None,
                    name: request.model_name.clone(),
                    model_type,
                    access: Access::Private,
                    default_permission: Permission::Read,
                    base_model_id: None,
                },
            )
            .await?;
        for (key, value) in &request.attributes {
            self.models
                .insert_attribute(&mut tx, model.id, key, value)
                .await?;
        }
        let next = guard_train_submit(model.train_status(), model.deploy_status())
            .map_err(convert::transition)?;
        self.models.set_train_status(&mut tx, model.id, next).await?;
        tx.commit().await.map_err(|e| e.into_data_error())?;

        // File staging happens outside the transaction; the job only starts
        // after the config is durable on shared storage.
        let mut data_paths = Vec::new();
        for upload in &uploads {
            let staged = paths::staged_upload_dir(model.id, upload.id);
            self.storage
                .rename(&paths::upload_dir(upload.id), &staged)
                .await
                .map_err(convert::storage)?;
            self.uploads.delete(upload.id).await?;
            data_paths.push(staged);
        }
        let config = serde_json::json!({
            "model_id": model.id,
            "model_type": model_type.as_str(),
            "data_paths": data_paths,
            "attributes": request.attributes,
        });
        self.storage
            .write(
                &paths::train_config_path(model.id),
                Bytes::from(serde_json::to_vec(&config).map_err(|e| ApiError::Internal(e.to_string()))?),
            )
            .await
            .map_err(convert::storage)?;

        self.start_train_job(&model, cpu, request.memory, request.datagen)
            .await?;
        self.audit(user, "train", model.id).await;
        info!(model_id = %model.id, model_type = model_type.as_str(), "train submitted");
        Ok(self.models.find(model.id).await?)
    }

    async fn start_train_job(
        &self,
        model: &Model,
        cpu_mhz: u64,
        memory_mb: Option<u64>,
        datagen: bool,
    ) -> Result<(), ApiError> {
        let job_token = self
            .job_tokens
            .issue(model.id, JobKind::Train, TRAIN_TOKEN_TTL_SECS)?;
        let params = TrainJobParams {
            job_name: paths::train_job_name(model.id),
            model_id: model.id.to_string(),
            config_path: paths::train_config_path(model.id),
            resources: ResourceRequest {
                cpu_mhz,
                memory_mb: memory_mb.unwrap_or(ResourceRequest::default().memory_mb),
            },
            datagen,
            job_token,
        };
        let job = self.templates.train_job(&params);

        let started = retry_once(|| self.orchestrator.start_job(&job)).await;
        if let Err(err) = started {
            self.fail_submission(model.id, JobKind::Train, &err).await;
            return Err(convert::orchestrator(err));
        }
        Ok(())
    }

    /// Roll a just-admitted job back to `failed` and record why.
    async fn fail_submission(&self, model_id: Uuid, kind: JobKind, err: &OrchestratorError) {
        let message = format!("job submission failed: {err}");
        warn!(model_id = %model_id, job = kind.as_str(), error = %err, "job submission failed");
        let cas = match kind {
            JobKind::Train => {
                self.models
                    .cas_train_status(model_id, &[Status::Starting], Status::Failed)
                    .await
            }
            _ => {
                self.models
                    .cas_deploy_status(model_id, &[Status::Starting], Status::Failed)
                    .await
            }
        };
        if let Err(db_err) = cas {
            warn!(model_id = %model_id, error = %db_err, "could not record submission failure");
        }
        if let Err(db_err) = self
            .job_logs
            .append(model_id, kind, LogLevel::Error, &message)
            .await
        {
            warn!(model_id = %model_id, error = %db_err, "could not append job log");
        }
    }

    /// Retrain: a new model descending from a trained source.
    pub async fn retrain(
        &self,
        user: &AuthenticatedUser,
        source_id: Uuid,
        new_name: &str,
    ) -> Result<Model, ApiError> {
        Self::ensure_can_create(user)?;
        let source = self.load_for_read(user, source_id).await?;
        guard_retrain(source.train_status(), source.deploy_status())
            .map_err(convert::transition)?;
        self.ensure_name_free(user.id, new_name).await?;
        self.admit(DEFAULT_TRAIN_CPU_MHZ).await?;

        let source_type = source
            .model_type()
            .ok_or_else(|| ApiError::Internal("source model has unknown type".into()))?;

        let mut tx = self.models.pool().begin().await.map_err(|e| e.into_data_error())?;
        let model = self
            .models
            .create(
                &mut tx,
                &NewModel {
                    id: Uuid::new_v4(),
                    user_id: user.id,
                    team_id: None,
                    name: new_name.to_string(),
                    model_type: source_type,
                    access: Access::Private,
                    default_permission: Permission::Read,
                    base_model_id: Some(source.id),
                },
            )
            .await?;
        for attr in self.models.attributes(source.id).await? {
            if PRIVATE_ATTRS.contains(&attr.key.as_str()) {
                continue;
            }
            self.models
                .insert_attribute(&mut tx, model.id, &attr.key, &attr.value)
                .await?;
        }
        self.models
            .set_train_status(&mut tx, model.id, Status::Starting)
            .await?;
        tx.commit().await.map_err(|e| e.into_data_error())?;

        let config = serde_json::json!({
            "model_id": model.id,
            "model_type": source_type.as_str(),
            "base_model_path": paths::model_artifact_dir(source.id),
        });
        self.storage
            .write(
                &paths::train_config_path(model.id),
                Bytes::from(serde_json::to_vec(&config).map_err(|e| ApiError::Internal(e.to_string()))?),
            )
            .await
            .map_err(convert::storage)?;

        self.start_train_job(&model, DEFAULT_TRAIN_CPU_MHZ, None, false)
            .await?;
        self.audit(user, "retrain", model.id).await;
        info!(model_id = %model.id, base = %source.id, "retrain submitted");
        Ok(self.models.find(model.id).await?)
    }

    // ── Deploy ────────────────────────────────────────────────────────────

    fn deploy_params_fingerprint(request: &DeployRequest) -> Result<String, ApiError> {
        serde_json::to_string(request).map_err(|e| ApiError::Internal(e.to_string()))
    }

    pub async fn submit_deploy(
        &self,
        user: &AuthenticatedUser,
        model_id: Uuid,
        request: DeployRequest,
    ) -> Result<(), ApiError> {
        let model = self.models.find(model_id).await?;
        Self::ensure_owner(user, &model)?;

        let fingerprint = Self::deploy_params_fingerprint(&request)?;

        // Idempotency: an identical resubmission while the job is coming up
        // succeeds without a second job; a conflicting one is refused.
        if model.deploy_status() == Status::Starting {
            let attrs = self.models.attributes(model.id).await?;
            let stored = attrs.iter().find(|a| a.key == DEPLOY_PARAMS_ATTR);
            return match stored {
                Some(attr) if attr.value == fingerprint => Ok(()),
                _ => Err(ApiError::Conflict(
                    "a deployment with different parameters is already starting".into(),
                )),
            };
        }

        let cpu = DEFAULT_DEPLOY_CPU_MHZ;
        self.admit(cpu).await?;

        let mut tx = self.models.pool().begin().await.map_err(|e| e.into_data_error())?;
        let locked = self.models.lock(&mut tx, model_id).await?;
        let next = guard_deploy_submit(locked.train_status(), locked.deploy_status())
            .map_err(convert::transition)?;
        self.models.set_deploy_status(&mut tx, model_id, next).await?;
        self.models
            .insert_attribute(&mut tx, model_id, DEPLOY_PARAMS_ATTR, &fingerprint)
            .await?;
        tx.commit().await.map_err(|e| e.into_data_error())?;

        let job_token = self
            .job_tokens
            .issue(model_id, JobKind::Deploy, DEPLOY_TOKEN_TTL_SECS)?;
        let min = request.autoscaling_min.unwrap_or(1).max(1);
        let params = DeployJobParams {
            job_name: paths::deploy_job_name(model_id),
            model_id: model_id.to_string(),
            deployment_name: request.deployment_name.clone(),
            resources: ResourceRequest {
                cpu_mhz: cpu,
                memory_mb: request.memory.unwrap_or(ResourceRequest::default().memory_mb),
            },
            autoscaling: AutoscalingPolicy {
                enabled: request.autoscaling_enabled,
                min_allocations: min,
                max_allocations: request.autoscaling_max.unwrap_or(min).max(min),
                ..AutoscalingPolicy::default()
            },
            job_token,
        };
        let job = self.templates.deploy_job(&params);

        let started = retry_once(|| self.orchestrator.start_job(&job)).await;
        if let Err(err) = started {
            self.fail_submission(model_id, JobKind::Deploy, &err).await;
            return Err(convert::orchestrator(err));
        }
        self.audit(user, "deploy", model_id).await;
        info!(model_id = %model_id, "deploy submitted");
        Ok(())
    }

    /// Live endpoints of a deployment, from the scheduler's service catalog.
    pub async fn deployment_endpoints(
        &self,
        user: &AuthenticatedUser,
        model_id: Uuid,
    ) -> Result<Vec<DeploymentEndpoint>, ApiError> {
        self.load_for_read(user, model_id).await?;
        let services = retry_once(|| self.orchestrator.list_services())
            .await
            .map_err(convert::orchestrator)?;
        let job_name = paths::deploy_job_name(model_id);
        let ingress = self.orchestrator.ingress_hostname();
        Ok(services
            .into_iter()
            .filter(|service| service.name == job_name)
            .flat_map(|service| service.allocations)
            .map(|alloc| DeploymentEndpoint {
                internal_address: format!("{}:{}", alloc.address, alloc.port),
                public_url: format!("https://{ingress}/{model_id}/"),
                alloc_id: alloc.alloc_id,
                node_id: alloc.node_id,
            })
            .collect())
    }

    pub async fn undeploy(
        &self,
        user: &AuthenticatedUser,
        model_id: Uuid,
    ) -> Result<(), ApiError> {
        let model = self.models.find(model_id).await?;
        Self::ensure_owner(user, &model)?;

        let mut tx = self.models.pool().begin().await.map_err(|e| e.into_data_error())?;
        let locked = self.models.lock(&mut tx, model_id).await?;
        let next = guard_undeploy(locked.train_status(), locked.deploy_status())
            .map_err(convert::transition)?;
        self.models.set_deploy_status(&mut tx, model_id, next).await?;
        tx.commit().await.map_err(|e| e.into_data_error())?;

        // Stopping a job that is already gone is fine.
        let deploy_job_name = paths::deploy_job_name(model_id);
        match retry_once(|| self.orchestrator.stop_job(&deploy_job_name)).await {
            Ok(()) | Err(OrchestratorError::JobNotFound(_)) => {}
            Err(err) => {
                warn!(model_id = %model_id, error = %err, "undeploy could not stop job; synchronizer will reap it");
            }
        }
        self.audit(user, "undeploy", model_id).await;
        info!(model_id = %model_id, "undeployed");
        Ok(())
    }

    // ── Save from a running deployment ────────────────────────────────────

    pub async fn save_deployed(
        &self,
        user: &AuthenticatedUser,
        source_id: Uuid,
        request: SaveRequest,
    ) -> Result<SaveResponse, ApiError> {
        Self::ensure_can_create(user)?;
        let source = self.load_for_read(user, source_id).await?;
        if !matches!(source.deploy_status(), Status::InProgress | Status::Complete) {
            return Err(ApiError::FailedPrecondition(
                "save requires a running deployment".into(),
            ));
        }
        self.ensure_name_free(user.id, &request.model_name).await?;
        let source_type = source
            .model_type()
            .ok_or_else(|| ApiError::Internal("source model has unknown type".into()))?;

        let mut tx = self.models.pool().begin().await.map_err(|e| e.into_data_error())?;
        let model = self
            .models
            .create(
                &mut tx,
                &NewModel {
                    id: Uuid::new_v4(),
                    user_id: user.id,
                    team_id: None,
                    name: request.model_name.clone(),
                    model_type: source_type,
                    access: Access::Private,
                    default_permission: Permission::Read,
                    base_model_id: Some(source.id),
                },
            )
            .await?;
        // The deployment writes the artifacts; until it reports back, the
        // new model reads as training in progress.
        self.models
            .set_train_status(&mut tx, model.id, Status::InProgress)
            .await?;
        tx.commit().await.map_err(|e| e.into_data_error())?;

        let update_token = self
            .job_tokens
            .issue(model.id, JobKind::Train, UPDATE_TOKEN_TTL_SECS)?;
        self.audit(user, "save", model.id).await;
        info!(model_id = %model.id, source = %source.id, "save started");
        Ok(SaveResponse {
            model_id: model.id,
            update_token,
        })
    }

    // ── Job callbacks (job-auth) ──────────────────────────────────────────

    /// A running job reports its own status. The compare-and-set keeps this
    /// advisory: if a user operation already moved the model on, the report
    /// is dropped.
    pub async fn update_status_from_job(
        &self,
        claims: JobClaims,
        request: UpdateStatusRequest,
    ) -> Result<(), ApiError> {
        let target = Status::parse(&request.status).ok_or_else(|| {
            ApiError::InvalidRequest(format!("unknown status '{}'", request.status))
        })?;
        if !matches!(target, Status::InProgress | Status::Complete | Status::Failed) {
            return Err(ApiError::InvalidRequest(format!(
                "jobs may only report in_progress, complete, or failed, not '{}'",
                request.status
            )));
        }

        let from = [Status::Starting, Status::InProgress];
        let updated = match claims.job_kind {
            JobKind::Deploy => {
                self.models
                    .cas_deploy_status(claims.model_id, &from, target)
                    .await?
            }
            _ => {
                self.models
                    .cas_train_status(claims.model_id, &from, target)
                    .await?
            }
        };
        if updated && target.is_terminal() {
            let level = if target == Status::Failed {
                LogLevel::Error
            } else {
                LogLevel::Info
            };
            let metadata = request
                .metadata
                .map(|m| format!(" ({m})"))
                .unwrap_or_default();
            self.job_logs
                .append(
                    claims.model_id,
                    claims.job_kind,
                    level,
                    &format!("job reported {}{metadata}", target.as_str()),
                )
                .await?;
        }
        Ok(())
    }

    pub async fn append_job_log(
        &self,
        claims: JobClaims,
        level: LogLevel,
        message: &str,
    ) -> Result<(), ApiError> {
        self.job_logs
            .append(claims.model_id, claims.job_kind, level, message)
            .await?;
        Ok(())
    }

    // ── Status & logs ─────────────────────────────────────────────────────

    pub async fn status(
        &self,
        user: &AuthenticatedUser,
        model_id: Uuid,
        kind: JobKind,
    ) -> Result<StatusResponse, ApiError> {
        let model = self.load_for_read(user, model_id).await?;
        let status = match kind {
            JobKind::Deploy => model.deploy_status(),
            _ => model.train_status(),
        };
        Ok(StatusResponse {
            status,
            errors: self.job_logs.messages(model_id, kind, LogLevel::Error).await?,
            warnings: self
                .job_logs
                .messages(model_id, kind, LogLevel::Warning)
                .await?,
        })
    }

    pub async fn logs(
        &self,
        user: &AuthenticatedUser,
        model_id: Uuid,
        kind: JobKind,
    ) -> Result<Vec<AllocationLogs>, ApiError> {
        self.load_for_read(user, model_id).await?;
        let job_name = match kind {
            JobKind::Deploy => paths::deploy_job_name(model_id),
            _ => paths::train_job_name(model_id),
        };
        match retry_once(|| self.orchestrator.job_logs(&job_name)).await {
            Ok(logs) => Ok(logs
                .into_iter()
                .map(|l| AllocationLogs {
                    alloc_id: l.alloc_id,
                    stdout: l.stdout,
                    stderr: l.stderr,
                })
                .collect()),
            // A reaped job has no logs left; that is an empty answer, not an
            // error.
            Err(OrchestratorError::JobNotFound(_)) => Ok(Vec::new()),
            Err(err) => Err(convert::orchestrator(err)),
        }
    }

    // ── Composition ───────────────────────────────────────────────────────

    /// Create a composed model (enterprise-search, knowledge-extraction)
    /// from existing components.
    pub async fn create_composed(
        &self,
        user: &AuthenticatedUser,
        model_type: ModelType,
        request: ComposeRequest,
    ) -> Result<Model, ApiError> {
        if !model_type.is_composed() {
            return Err(ApiError::InvalidRequest(format!(
                "{} is not a composed model type",
                model_type.as_str()
            )));
        }
        if request.dependencies.is_empty() {
            return Err(ApiError::InvalidRequest(
                "a composed model needs at least one component".into(),
            ));
        }
        Self::ensure_can_create(user)?;
        self.ensure_name_free(user.id, &request.model_name).await?;

        let new_id = request.model_id.unwrap_or_else(Uuid::new_v4);
        self.assert_acyclic(new_id, &request.dependencies).await?;

        // Read access on every component, and every component trained.
        for dep_id in &request.dependencies {
            let dep = self.load_for_read(user, *dep_id).await?;
            if dep.train_status() != Status::Complete {
                return Err(ApiError::FailedPrecondition(format!(
                    "component {dep_id} has not finished training"
                )));
            }
        }

        let mut tx = self.models.pool().begin().await.map_err(|e| e.into_data_error())?;
        let model = self
            .models
            .create(
                &mut tx,
                &NewModel {
                    id: new_id,
                    user_id: user.id,
                    team_id: None,
                    name: request.model_name.clone(),
                    model_type,
                    access: request.access.unwrap_or(Access::Private),
                    default_permission: Permission::Read,
                    base_model_id: None,
                },
            )
            .await?;
        for (position, dep_id) in request.dependencies.iter().enumerate() {
            self.models
                .insert_dependency(&mut tx, model.id, *dep_id, position as i32)
                .await?;
        }
        // Composition of trained components needs no training job of its own.
        self.models
            .set_train_status(&mut tx, model.id, Status::Complete)
            .await?;
        tx.commit().await.map_err(|e| e.into_data_error())?;

        self.audit(user, "compose", model.id).await;
        info!(model_id = %model.id, model_type = model_type.as_str(), "composed model created");
        Ok(self.models.find(model.id).await?)
    }

    /// Reject self-references, duplicates, and cycles by explicit traversal
    /// of the persisted dependency graph.
    async fn assert_acyclic(&self, new_id: Uuid, dependencies: &[Uuid]) -> Result<(), ApiError> {
        let mut seen = std::collections::HashSet::new();
        for dep in dependencies {
            if *dep == new_id {
                return Err(ApiError::Conflict(
                    "a model cannot depend on itself".into(),
                ));
            }
            if !seen.insert(*dep) {
                return Err(ApiError::Conflict(format!("duplicate dependency {dep}")));
            }
        }

        let mut stack: Vec<Uuid> = dependencies.to_vec();
        let mut visited = std::collections::HashSet::new();
        while let Some(current) = stack.pop() {
            if current == new_id {
                return Err(ApiError::Conflict(
                    "dependency graph would contain a cycle".into(),
                ));
            }
            if !visited.insert(current) {
                continue;
            }
            for edge in self.models.dependencies(current).await? {
                stack.push(edge.dependency_id);
            }
        }
        Ok(())
    }

    // ── Read, list, admin ─────────────────────────────────────────────────

    pub async fn list_visible(&self, user: &AuthenticatedUser) -> Result<Vec<Model>, ApiError> {
        let memberships = self.teams.memberships(user.id).await?;
        let team_ids: Vec<Uuid> = memberships.iter().map(|m| m.team_id).collect();
        let mut models = self.models.list_visible(user.id, &team_ids).await?;
        models.retain(|m| user.in_scope(m.id));
        Ok(models)
    }

    pub async fn detail(
        &self,
        user: &AuthenticatedUser,
        model_id: Uuid,
    ) -> Result<ModelDetail, ApiError> {
        let model = self.load_for_read(user, model_id).await?;
        let attributes = self.models.attributes(model_id).await?;
        let dependencies = self.models.dependencies(model_id).await?;
        let size_bytes = if model.train_status() == Status::Complete {
            self.storage
                .size(&paths::model_artifact_dir(model_id))
                .await
                .ok()
        } else {
            None
        };
        Ok(ModelDetail {
            model,
            attributes,
            dependencies,
            size_bytes,
        })
    }

    pub async fn set_access(
        &self,
        user: &AuthenticatedUser,
        model_id: Uuid,
        access: Access,
        default_permission: Option<Permission>,
    ) -> Result<(), ApiError> {
        let model = self.models.find(model_id).await?;
        Self::ensure_owner(user, &model)?;
        let default_permission = default_permission.unwrap_or(model.default_permission());
        self.models
            .set_access(model_id, access, default_permission)
            .await?;
        Ok(())
    }

    pub async fn grant(
        &self,
        user: &AuthenticatedUser,
        model_id: Uuid,
        grantee: Uuid,
        permission: Permission,
    ) -> Result<(), ApiError> {
        let model = self.models.find(model_id).await?;
        Self::ensure_owner(user, &model)?;
        self.models.grant(model_id, grantee, permission).await?;
        Ok(())
    }

    pub async fn revoke(
        &self,
        user: &AuthenticatedUser,
        model_id: Uuid,
        grantee: Uuid,
    ) -> Result<(), ApiError> {
        let model = self.models.find(model_id).await?;
        Self::ensure_owner(user, &model)?;
        self.models.revoke(model_id, grantee).await?;
        Ok(())
    }

    pub async fn assign_team(
        &self,
        user: &AuthenticatedUser,
        model_id: Uuid,
        team_id: Option<Uuid>,
    ) -> Result<(), ApiError> {
        let model = self.models.find(model_id).await?;
        Self::ensure_owner(user, &model)?;
        if let Some(team_id) = team_id {
            self.teams.find(team_id).await?;
        }
        self.models.set_team(model_id, team_id).await?;
        Ok(())
    }

    // ── Delete ────────────────────────────────────────────────────────────

    pub async fn delete(&self, user: &AuthenticatedUser, model_id: Uuid) -> Result<(), ApiError> {
        let model = self.models.find(model_id).await?;
        Self::ensure_owner(user, &model)?;

        let was_training;
        {
            let mut tx = self.models.pool().begin().await.map_err(|e| e.into_data_error())?;
            let locked = self.models.lock(&mut tx, model_id).await?;
            guard_delete(locked.train_status(), locked.deploy_status())
                .map_err(convert::transition)?;
            if self.models.dependent_count(&mut tx, model_id).await? > 0 {
                return Err(ApiError::Conflict(
                    "model is a dependency of other models".into(),
                ));
            }
            if self.models.descendant_count(&mut tx, model_id).await? > 0 {
                return Err(ApiError::Conflict(
                    "model is the base of other models".into(),
                ));
            }
            was_training = locked.train_status().is_live();
            self.models.delete(&mut tx, model_id).await?;
            tx.commit().await.map_err(|e| e.into_data_error())?;
        }

        // The row is gone; jobs and files are best-effort cleanup.
        if was_training {
            let train_job_name = paths::train_job_name(model_id);
            if let Err(err) =
                retry_once(|| self.orchestrator.stop_job(&train_job_name)).await
            {
                if !matches!(err, OrchestratorError::JobNotFound(_)) {
                    warn!(model_id = %model_id, error = %err, "could not stop training job");
                }
            }
        }
        for subtree in [paths::model_dir(model_id), paths::data_dir(model_id)] {
            match self.storage.delete(&subtree).await {
                Ok(()) | Err(bazaar_storage::StorageError::NotFound(_)) => {}
                Err(err) => {
                    warn!(model_id = %model_id, path = %subtree, error = %err, "could not delete storage subtree");
                }
            }
        }
        self.audit(user, "delete", model_id).await;
        info!(model_id = %model_id, "model deleted");
        Ok(())
    }

    // ── Bulk artifact transfer ────────────────────────────────────────────

    /// Zip the artifact tree and stream it out.
    pub async fn download(
        &self,
        user: &AuthenticatedUser,
        model_id: Uuid,
    ) -> Result<ByteStream, ApiError> {
        let model = self.models.find(model_id).await?;
        Self::ensure_owner(user, &model)?;
        if model.train_status() != Status::Complete {
            return Err(ApiError::FailedPrecondition(
                "model has no artifacts until training completes".into(),
            ));
        }
        let archive = self
            .storage
            .zip(&paths::model_artifact_dir(model_id))
            .await
            .map_err(convert::storage)?;
        self.storage.open_reader(&archive).await.map_err(convert::storage)
    }

    /// Import a model from an uploaded artifact archive.
    pub async fn import(
        &self,
        user: &AuthenticatedUser,
        name: &str,
        model_type: ModelType,
        archive: Bytes,
    ) -> Result<Model, ApiError> {
        Self::ensure_can_create(user)?;
        self.ensure_name_free(user.id, name).await?;

        let mut tx = self.models.pool().begin().await.map_err(|e| e.into_data_error())?;
        let model = self
            .models
            .create(
                &mut tx,
                &NewModel {
                    id: Uuid::new_v4(),
                    user_id: user.id,
                    team_id: None,
                    name: name.to_string(),
                    model_type,
                    access: Access::Private,
                    default_permission: Permission::Read,
                    base_model_id: None,
                },
            )
            .await?;
        tx.commit().await.map_err(|e| e.into_data_error())?;

        let archive_path = format!("{}.upload.zip", paths::model_dir(model.id));
        self.storage
            .write(&archive_path, archive)
            .await
            .map_err(convert::storage)?;
        self.storage
            .unzip(&archive_path, &paths::model_artifact_dir(model.id))
            .await
            .map_err(convert::storage)?;
        self.storage
            .delete(&archive_path)
            .await
            .map_err(convert::storage)?;

        let mut tx = self.models.pool().begin().await.map_err(|e| e.into_data_error())?;
        self.models
            .set_train_status(&mut tx, model.id, Status::Complete)
            .await?;
        tx.commit().await.map_err(|e| e.into_data_error())?;

        self.audit(user, "import", model.id).await;
        info!(model_id = %model.id, "model imported");
        Ok(self.models.find(model.id).await?)
    }

    // ── Uploads ───────────────────────────────────────────────────────────

    /// Stage an uploaded file group; returns the upload id train requests
    /// reference.
    pub async fn stage_upload(
        &self,
        user: &AuthenticatedUser,
        files: Vec<(String, Bytes)>,
    ) -> Result<Upload, ApiError> {
        Self::ensure_can_create(user)?;
        if files.is_empty() {
            return Err(ApiError::InvalidRequest("no files in upload".into()));
        }
        let upload = Upload {
            id: Uuid::new_v4(),
            user_id: user.id,
            created_at: chrono::Utc::now(),
        };
        for (file_name, contents) in &files {
            if !is_safe_file_name(file_name) {
                return Err(ApiError::InvalidRequest(format!(
                    "unusable file name '{file_name}'"
                )));
            }
            self.storage
                .write(
                    &format!("{}/{file_name}", paths::upload_dir(upload.id)),
                    contents.clone(),
                )
                .await
                .map_err(convert::storage)?;
        }
        self.uploads.create(&upload).await?;
        Ok(upload)
    }

    /// Uploads the caller has staged and not yet consumed.
    pub async fn list_uploads(&self, user: &AuthenticatedUser) -> Result<Vec<Upload>, ApiError> {
        Ok(self.uploads.list_by_owner(user.id).await?)
    }

    /// One upload with the file names staged under it.
    pub async fn upload_detail(
        &self,
        user: &AuthenticatedUser,
        upload_id: Uuid,
    ) -> Result<UploadDetail, ApiError> {
        let upload = self.uploads.find(upload_id).await?;
        if upload.user_id != user.id && !user.is_admin {
            return Err(ApiError::NotFound(format!("upload {upload_id}")));
        }
        let files = match self.storage.list(&paths::upload_dir(upload_id)).await {
            Ok(files) => files,
            Err(bazaar_storage::StorageError::NotFound(_)) => Vec::new(),
            Err(err) => return Err(convert::storage(err)),
        };
        Ok(UploadDetail { upload, files })
    }
}

/// Upload file names stay inside their upload directory: no separators, no
/// traversal, nothing hidden.
fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | ' '))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_with_traversal_are_rejected() {
        assert!(is_safe_file_name("report.pdf"));
        assert!(is_safe_file_name("data set v2.csv"));
        assert!(!is_safe_file_name("../escape"));
        assert!(!is_safe_file_name("a/b.csv"));
        assert!(!is_safe_file_name(".hidden"));
        assert!(!is_safe_file_name(""));
    }

    #[test]
    fn deploy_fingerprint_is_stable_and_order_insensitive_to_defaults() {
        let a = DeployRequest {
            deployment_name: Some("app".into()),
            autoscaling_enabled: true,
            autoscaling_min: Some(1),
            autoscaling_max: Some(4),
            memory: Some(800),
        };
        let b = a.clone();
        assert_eq!(
            ModelService::deploy_params_fingerprint(&a).unwrap(),
            ModelService::deploy_params_fingerprint(&b).unwrap()
        );
        let c = DeployRequest {
            memory: Some(900),
            ..a.clone()
        };
        assert_ne!(
            ModelService::deploy_params_fingerprint(&a).unwrap(),
            ModelService::deploy_params_fingerprint(&c).unwrap()
        );
    }
}
