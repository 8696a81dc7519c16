//! Startup of the bundled in-cluster services.
//!
//! Each singleton is started stop-if-exists-then-start, so a control-plane
//! restart converges the cluster instead of erroring on leftovers.

use std::sync::Arc;

use tracing::{info, warn};

use bazaar_core::{retry_once, ApiError};
use bazaar_jobs::{JobTemplates, RecoveryJobParams, ResourceRequest, SingletonService};
use bazaar_orchestrator::{Orchestrator, OrchestratorError};

use crate::convert;
use crate::paths::RECOVERY_JOB_NAME;

/// Daily at 03:00; the recovery job snapshots the database and storage tree.
const RECOVERY_SCHEDULE: &str = "0 3 * * *";

async fn restart_job(
    orchestrator: &Arc<dyn Orchestrator>,
    job: bazaar_orchestrator::Job,
) -> Result<(), ApiError> {
    match orchestrator.stop_job(&job.name).await {
        Ok(()) | Err(OrchestratorError::JobNotFound(_)) => {}
        Err(err) => {
            warn!(job = %job.name, error = %err, "could not stop previous instance");
        }
    }
    retry_once(|| orchestrator.start_job(&job))
        .await
        .map_err(convert::orchestrator)?;
    info!(job = %job.name, "platform job started");
    Ok(())
}

/// Start every bundled singleton plus the recovery snapshot job.
pub async fn start_platform_services(
    orchestrator: &Arc<dyn Orchestrator>,
    templates: &JobTemplates,
) -> Result<(), ApiError> {
    for service in SingletonService::ALL {
        restart_job(orchestrator, templates.singleton_job(service)).await?;
    }
    restart_job(
        orchestrator,
        templates.recovery_job(&RecoveryJobParams {
            job_name: RECOVERY_JOB_NAME.to_string(),
            schedule: RECOVERY_SCHEDULE.to_string(),
            resources: ResourceRequest::default(),
        }),
    )
    .await?;
    Ok(())
}
