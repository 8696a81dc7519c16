//! The status synchronizer: a single background task reconciling
//! orchestrator-reported job state into the database.
//!
//! The task is stateless across restarts — the only in-memory state is the
//! per-job count of consecutive "not found" observations, which exists to
//! give freshly submitted jobs one tick of grace before they are declared
//! lost. Every write is a compare-and-set, so a user operation that raced
//! ahead simply wins and the synchronizer's update is dropped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use bazaar_core::{ApiError, JobKind, LogLevel, Status};
use bazaar_data::repositories::{JobLogRepository, ModelRepository};
use bazaar_orchestrator::{Orchestrator, OrchestratorError};

use crate::lifecycle::{reconcile, ObservedJob, SyncAction};
use crate::paths;

/// Longest stderr tail copied into a failure log entry.
const STDERR_TAIL_BYTES: usize = 2000;

pub struct StatusSynchronizer {
    models: ModelRepository,
    job_logs: JobLogRepository,
    orchestrator: Arc<dyn Orchestrator>,
    interval: Duration,
    missing: Mutex<HashMap<(Uuid, JobKind), u32>>,
}

impl StatusSynchronizer {
    pub fn new(
        models: ModelRepository,
        job_logs: JobLogRepository,
        orchestrator: Arc<dyn Orchestrator>,
        interval: Duration,
    ) -> Self {
        Self {
            models,
            job_logs,
            orchestrator,
            interval,
            missing: Mutex::new(HashMap::new()),
        }
    }

    /// Run until the token is cancelled. In-flight work for the current tick
    /// finishes before the task exits.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_secs = self.interval.as_secs(), "status synchronizer started");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("status synchronizer draining");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(err) = self.tick().await {
                            warn!(error = %err, "synchronizer tick failed");
                        }
                    }
                }
            }
        })
    }

    /// One reconciliation pass over every model with a live job.
    pub async fn tick(&self) -> Result<(), ApiError> {
        let models = self.models.list_non_terminal().await?;
        debug!(candidates = models.len(), "synchronizer tick");
        for model in models {
            if model.train_status().is_live() {
                self.sync_job(model.id, JobKind::Train, model.train_status())
                    .await;
            }
            if model.deploy_status().is_live() {
                self.sync_job(model.id, JobKind::Deploy, model.deploy_status())
                    .await;
            }
        }
        Ok(())
    }

    async fn sync_job(&self, model_id: Uuid, kind: JobKind, db_status: Status) {
        let job_name = match kind {
            JobKind::Deploy => paths::deploy_job_name(model_id),
            _ => paths::train_job_name(model_id),
        };

        let observed = match self.orchestrator.job_info(&job_name).await {
            Ok(info) => ObservedJob::Reported(info.status),
            Err(OrchestratorError::JobNotFound(_)) => ObservedJob::Missing,
            Err(err) => {
                // Transient; the next tick is the retry.
                warn!(job = %job_name, error = %err, "orchestrator unreachable, skipping");
                return;
            }
        };

        let missing_ticks = self.track_missing(model_id, kind, observed).await;
        let action = reconcile(db_status, observed, missing_ticks);
        if let Err(err) = self.apply(model_id, kind, action, observed).await {
            warn!(job = %job_name, error = %err, "could not apply sync action");
        }
    }

    /// Bump or clear the consecutive-missing counter, returning the count
    /// including this observation.
    async fn track_missing(&self, model_id: Uuid, kind: JobKind, observed: ObservedJob) -> u32 {
        let mut missing = self.missing.lock().await;
        match observed {
            ObservedJob::Missing => {
                let count = missing.entry((model_id, kind)).or_insert(0);
                *count += 1;
                *count
            }
            ObservedJob::Reported(_) => {
                missing.remove(&(model_id, kind));
                0
            }
        }
    }

    async fn apply(
        &self,
        model_id: Uuid,
        kind: JobKind,
        action: SyncAction,
        observed: ObservedJob,
    ) -> Result<(), ApiError> {
        let live = [Status::Starting, Status::InProgress];
        match action {
            SyncAction::None => {}
            SyncAction::SetInProgress => {
                self.cas(model_id, kind, &[Status::Starting], Status::InProgress)
                    .await?;
            }
            SyncAction::SetComplete => {
                if self.cas(model_id, kind, &live, Status::Complete).await? {
                    self.job_logs
                        .append(model_id, kind, LogLevel::Info, "job completed")
                        .await?;
                    info!(model_id = %model_id, job = kind.as_str(), "job completed");
                }
                self.missing.lock().await.remove(&(model_id, kind));
            }
            SyncAction::SetFailed => {
                if self.cas(model_id, kind, &live, Status::Failed).await? {
                    let message = match observed {
                        ObservedJob::Missing => {
                            "job disappeared from the orchestrator".to_string()
                        }
                        ObservedJob::Reported(_) => {
                            format!("job failed: {}", self.stderr_tail(model_id, kind).await)
                        }
                    };
                    self.job_logs
                        .append(model_id, kind, LogLevel::Error, &message)
                        .await?;
                    warn!(model_id = %model_id, job = kind.as_str(), "job failed");
                }
                self.missing.lock().await.remove(&(model_id, kind));
            }
        }
        Ok(())
    }

    async fn cas(
        &self,
        model_id: Uuid,
        kind: JobKind,
        from: &[Status],
        to: Status,
    ) -> Result<bool, ApiError> {
        let updated = match kind {
            JobKind::Deploy => self.models.cas_deploy_status(model_id, from, to).await?,
            _ => self.models.cas_train_status(model_id, from, to).await?,
        };
        if !updated {
            debug!(model_id = %model_id, job = kind.as_str(), to = to.as_str(), "cas skipped, state moved concurrently");
        }
        Ok(updated)
    }

    /// Tail of the last allocation's stderr, for failure log entries.
    async fn stderr_tail(&self, model_id: Uuid, kind: JobKind) -> String {
        let job_name = match kind {
            JobKind::Deploy => paths::deploy_job_name(model_id),
            _ => paths::train_job_name(model_id),
        };
        match self.orchestrator.job_logs(&job_name).await {
            Ok(logs) => logs
                .last()
                .map(|l| tail(&l.stderr, STDERR_TAIL_BYTES))
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "no stderr captured".to_string()),
            Err(_) => "no stderr captured".to_string(),
        }
    }
}

/// Last `max_bytes` of a string, on a char boundary.
fn tail(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut start = s.len() - max_bytes;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    s[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_keeps_short_strings_whole() {
        assert_eq!(tail("boom", 10), "boom");
    }

    #[test]
    fn tail_cuts_on_char_boundaries() {
        let s = "error: καλημέρα panic";
        let t = tail(s, 8);
        assert!(t.len() <= 8);
        assert!(s.ends_with(&t));
    }
}
