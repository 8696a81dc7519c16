//! Canonical storage layout and job naming, in one place.
//!
//! ```text
//! models/{model_id}/model/…      artifacts written by jobs
//! data/{model_id}/…              staged training data and configs
//! uploads/{upload_id}/…          user uploads awaiting a train request
//! ```

use uuid::Uuid;

pub fn model_dir(model_id: Uuid) -> String {
    format!("models/{model_id}")
}

pub fn model_artifact_dir(model_id: Uuid) -> String {
    format!("models/{model_id}/model")
}

pub fn data_dir(model_id: Uuid) -> String {
    format!("data/{model_id}")
}

/// Where the train job expects its config, relative to the share root.
pub fn train_config_path(model_id: Uuid) -> String {
    format!("data/{model_id}/train_config.json")
}

pub fn upload_dir(upload_id: Uuid) -> String {
    format!("uploads/{upload_id}")
}

/// Where an upload's files land once staged for a model.
pub fn staged_upload_dir(model_id: Uuid, upload_id: Uuid) -> String {
    format!("data/{model_id}/{upload_id}")
}

pub fn train_job_name(model_id: Uuid) -> String {
    format!("train-{model_id}")
}

pub fn deploy_job_name(model_id: Uuid) -> String {
    format!("deploy-{model_id}")
}

pub const RECOVERY_JOB_NAME: &str = "recovery-snapshot";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_model_scoped() {
        let id = Uuid::nil();
        assert_eq!(model_dir(id), format!("models/{id}"));
        assert_eq!(train_config_path(id), format!("data/{id}/train_config.json"));
        assert!(staged_upload_dir(id, id).starts_with(&data_dir(id)));
    }
}
