//! The model lifecycle state machine, as pure functions.
//!
//! Transition guards take the current persisted state and answer with the
//! next state or a typed refusal; the reconcile functions map an observed
//! orchestrator status onto the action the synchronizer should take. Nothing
//! in this module touches a database or a scheduler, which is what keeps the
//! invariants testable in isolation. Callers run each guard inside a
//! row-locked transaction so no two transitions observe the same starting
//! state.

use bazaar_core::Status;
use bazaar_orchestrator::JobStatus;

/// A transition guard refused the operation.
#[derive(Debug, PartialEq, Eq)]
pub enum TransitionError {
    /// The operation is illegal in the current state.
    InvalidState {
        operation: &'static str,
        train: Status,
        deploy: Status,
    },
    /// Deploy requested before training finished.
    NotTrained { train: Status },
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionError::InvalidState {
                operation,
                train,
                deploy,
            } => write!(
                f,
                "cannot {operation} while train={} deploy={}",
                train.as_str(),
                deploy.as_str()
            ),
            TransitionError::NotTrained { train } => {
                write!(f, "model train status is {}, must be complete", train.as_str())
            }
        }
    }
}

impl std::error::Error for TransitionError {}

/// Train submission: only a model that never trained may start.
pub fn guard_train_submit(train: Status, deploy: Status) -> Result<Status, TransitionError> {
    match train {
        Status::NotStarted => Ok(Status::Starting),
        _ => Err(TransitionError::InvalidState {
            operation: "submit train",
            train,
            deploy,
        }),
    }
}

/// Deploy submission: training must be complete and no deployment may be
/// live. Only `not_started`, `stopped`, and `failed` re-admit a deploy.
pub fn guard_deploy_submit(train: Status, deploy: Status) -> Result<Status, TransitionError> {
    if train != Status::Complete {
        return Err(TransitionError::NotTrained { train });
    }
    match deploy {
        Status::NotStarted | Status::Stopped | Status::Failed => Ok(Status::Starting),
        _ => Err(TransitionError::InvalidState {
            operation: "submit deploy",
            train,
            deploy,
        }),
    }
}

/// Undeploy: legal from any state where a deployment exists or existed.
pub fn guard_undeploy(train: Status, deploy: Status) -> Result<Status, TransitionError> {
    match deploy {
        Status::Starting | Status::InProgress | Status::Complete | Status::Failed => {
            Ok(Status::Stopped)
        }
        _ => Err(TransitionError::InvalidState {
            operation: "undeploy",
            train,
            deploy,
        }),
    }
}

/// Retrain reads the source model; it must have finished training.
pub fn guard_retrain(train: Status, deploy: Status) -> Result<(), TransitionError> {
    if train == Status::Complete {
        Ok(())
    } else {
        Err(TransitionError::InvalidState {
            operation: "retrain",
            train,
            deploy,
        })
    }
}

/// Delete: refused while a deployment is live; referential checks are the
/// caller's to run under the same lock.
pub fn guard_delete(train: Status, deploy: Status) -> Result<(), TransitionError> {
    match deploy {
        Status::Starting | Status::InProgress | Status::Complete => {
            Err(TransitionError::InvalidState {
                operation: "delete",
                train,
                deploy,
            })
        }
        _ => Ok(()),
    }
}

/// What the synchronizer saw for a job on the orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObservedJob {
    Reported(JobStatus),
    /// The orchestrator does not know the job.
    Missing,
}

/// The synchronizer's verdict for one (model, job) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncAction {
    /// Nothing to change this tick.
    None,
    /// Job is placed or running; record progress.
    SetInProgress,
    /// Job finished successfully.
    SetComplete,
    /// Job failed, disappeared past the grace period, or died unexpectedly.
    SetFailed,
}

/// Consecutive missing observations tolerated before a live job is declared
/// lost. One extra tick covers eventual registration after submission.
pub const MISSING_GRACE_TICKS: u32 = 1;

/// Map an observed orchestrator status onto the train-status action.
///
/// `missing_ticks` counts consecutive `Missing` observations including this
/// one; the caller owns that counter.
pub fn reconcile(db: Status, observed: ObservedJob, missing_ticks: u32) -> SyncAction {
    if !db.is_live() {
        return SyncAction::None;
    }
    match observed {
        ObservedJob::Reported(JobStatus::Pending) | ObservedJob::Reported(JobStatus::Running) => {
            if db == Status::Starting {
                SyncAction::SetInProgress
            } else {
                SyncAction::None
            }
        }
        ObservedJob::Reported(JobStatus::Dead { failed: false }) => SyncAction::SetComplete,
        ObservedJob::Reported(JobStatus::Dead { failed: true }) => SyncAction::SetFailed,
        ObservedJob::Missing => {
            if missing_ticks > MISSING_GRACE_TICKS {
                SyncAction::SetFailed
            } else {
                SyncAction::None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn train_submit_only_from_not_started() {
        assert_eq!(
            guard_train_submit(Status::NotStarted, Status::NotStarted),
            Ok(Status::Starting)
        );
        for blocked in [
            Status::Starting,
            Status::InProgress,
            Status::Complete,
            Status::Failed,
            Status::Stopped,
        ] {
            assert!(guard_train_submit(blocked, Status::NotStarted).is_err());
        }
    }

    #[test]
    fn deploy_requires_completed_training() {
        for train in [Status::NotStarted, Status::Starting, Status::InProgress, Status::Failed] {
            assert_eq!(
                guard_deploy_submit(train, Status::NotStarted),
                Err(TransitionError::NotTrained { train })
            );
        }
        assert_eq!(
            guard_deploy_submit(Status::Complete, Status::NotStarted),
            Ok(Status::Starting)
        );
    }

    #[test]
    fn only_stopped_and_failed_readmit_deploy() {
        for deploy in [Status::Stopped, Status::Failed, Status::NotStarted] {
            assert!(guard_deploy_submit(Status::Complete, deploy).is_ok());
        }
        for deploy in [Status::Starting, Status::InProgress, Status::Complete] {
            assert!(guard_deploy_submit(Status::Complete, deploy).is_err());
        }
    }

    #[test]
    fn undeploy_covers_live_and_failed_deployments() {
        for deploy in [
            Status::Starting,
            Status::InProgress,
            Status::Complete,
            Status::Failed,
        ] {
            assert_eq!(
                guard_undeploy(Status::Complete, deploy),
                Ok(Status::Stopped)
            );
        }
        assert!(guard_undeploy(Status::Complete, Status::NotStarted).is_err());
        assert!(guard_undeploy(Status::Complete, Status::Stopped).is_err());
    }

    #[test]
    fn delete_refused_while_deployment_is_live() {
        for deploy in [Status::Starting, Status::InProgress, Status::Complete] {
            assert!(guard_delete(Status::Complete, deploy).is_err());
        }
        for deploy in [Status::NotStarted, Status::Stopped, Status::Failed] {
            assert!(guard_delete(Status::Complete, deploy).is_ok());
        }
    }

    #[test]
    fn reconcile_moves_starting_to_in_progress() {
        assert_eq!(
            reconcile(Status::Starting, ObservedJob::Reported(JobStatus::Pending), 0),
            SyncAction::SetInProgress
        );
        assert_eq!(
            reconcile(Status::Starting, ObservedJob::Reported(JobStatus::Running), 0),
            SyncAction::SetInProgress
        );
        // Already in progress: no churn.
        assert_eq!(
            reconcile(Status::InProgress, ObservedJob::Reported(JobStatus::Running), 0),
            SyncAction::None
        );
    }

    #[test]
    fn reconcile_maps_dead_jobs_to_outcomes() {
        assert_eq!(
            reconcile(
                Status::InProgress,
                ObservedJob::Reported(JobStatus::Dead { failed: false }),
                0
            ),
            SyncAction::SetComplete
        );
        assert_eq!(
            reconcile(
                Status::Starting,
                ObservedJob::Reported(JobStatus::Dead { failed: true }),
                0
            ),
            SyncAction::SetFailed
        );
    }

    #[test]
    fn missing_jobs_get_one_tick_of_grace() {
        assert_eq!(
            reconcile(Status::InProgress, ObservedJob::Missing, 1),
            SyncAction::None
        );
        assert_eq!(
            reconcile(Status::InProgress, ObservedJob::Missing, 2),
            SyncAction::SetFailed
        );
    }

    #[test]
    fn terminal_states_are_never_touched() {
        for db in [Status::Complete, Status::Failed, Status::Stopped, Status::NotStarted] {
            assert_eq!(
                reconcile(db, ObservedJob::Reported(JobStatus::Running), 0),
                SyncAction::None
            );
            assert_eq!(reconcile(db, ObservedJob::Missing, 10), SyncAction::None);
        }
    }
}
