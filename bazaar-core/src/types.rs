//! Enumerations shared across the data, service, and HTTP layers.
//!
//! All of them serialize as snake_case strings and are stored in the database
//! as `TEXT`, so each carries an `as_str`/`parse` pair used by the repositories.

use serde::{Deserialize, Serialize};

/// The kind of trainable artifact a model row describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelType {
    Ndb,
    NlpToken,
    NlpText,
    KnowledgeExtraction,
    EnterpriseSearch,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Ndb => "ndb",
            ModelType::NlpToken => "nlp-token",
            ModelType::NlpText => "nlp-text",
            ModelType::KnowledgeExtraction => "knowledge-extraction",
            ModelType::EnterpriseSearch => "enterprise-search",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ndb" => Some(ModelType::Ndb),
            "nlp-token" => Some(ModelType::NlpToken),
            "nlp-text" => Some(ModelType::NlpText),
            "knowledge-extraction" => Some(ModelType::KnowledgeExtraction),
            "enterprise-search" => Some(ModelType::EnterpriseSearch),
            _ => None,
        }
    }

    /// Composed types are assembled from dependency models instead of raw data.
    pub fn is_composed(&self) -> bool {
        matches!(
            self,
            ModelType::KnowledgeExtraction | ModelType::EnterpriseSearch
        )
    }
}

/// Progress of a training or deployment job as recorded on the model row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    NotStarted,
    Starting,
    InProgress,
    Stopped,
    Complete,
    Failed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::NotStarted => "not_started",
            Status::Starting => "starting",
            Status::InProgress => "in_progress",
            Status::Stopped => "stopped",
            Status::Complete => "complete",
            Status::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(Status::NotStarted),
            "starting" => Some(Status::Starting),
            "in_progress" => Some(Status::InProgress),
            "stopped" => Some(Status::Stopped),
            "complete" => Some(Status::Complete),
            "failed" => Some(Status::Failed),
            _ => None,
        }
    }

    /// Terminal states are never revisited by the synchronizer.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Stopped | Status::Complete | Status::Failed)
    }

    /// States that mean a job should exist on the orchestrator.
    pub fn is_live(&self) -> bool {
        matches!(self, Status::Starting | Status::InProgress)
    }
}

/// Train and deploy statuses share the same value set.
pub type TrainStatus = Status;
pub type DeployStatus = Status;

/// Per-model visibility level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Private,
    Protected,
    Public,
}

impl Access {
    pub fn as_str(&self) -> &'static str {
        match self {
            Access::Private => "private",
            Access::Protected => "protected",
            Access::Public => "public",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "private" => Some(Access::Private),
            "protected" => Some(Access::Protected),
            "public" => Some(Access::Public),
            _ => None,
        }
    }
}

/// Default grant given by team membership or public visibility.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Read,
    Write,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Write => "write",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "read" => Some(Permission::Read),
            "write" => Some(Permission::Write),
            _ => None,
        }
    }
}

/// The kind of background job a log line or auth token is scoped to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Train,
    Deploy,
    Recovery,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Train => "train",
            JobKind::Deploy => "deploy",
            JobKind::Recovery => "recovery",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "train" => Some(JobKind::Train),
            "deploy" => Some(JobKind::Deploy),
            "recovery" => Some(JobKind::Recovery),
            _ => None,
        }
    }
}

/// Severity of a job log line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "info" => Some(LogLevel::Info),
            "warning" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            Status::NotStarted,
            Status::Starting,
            Status::InProgress,
            Status::Stopped,
            Status::Complete,
            Status::Failed,
        ] {
            assert_eq!(Status::parse(status.as_str()), Some(status));
        }
        assert_eq!(Status::parse("bogus"), None);
    }

    #[test]
    fn terminal_and_live_are_disjoint() {
        for status in [
            Status::NotStarted,
            Status::Starting,
            Status::InProgress,
            Status::Stopped,
            Status::Complete,
            Status::Failed,
        ] {
            assert!(!(status.is_terminal() && status.is_live()));
        }
    }

    #[test]
    fn model_type_serde_uses_kebab_case() {
        let json = serde_json::to_string(&ModelType::EnterpriseSearch).unwrap();
        assert_eq!(json, "\"enterprise-search\"");
        assert!(ModelType::EnterpriseSearch.is_composed());
        assert!(!ModelType::Ndb.is_composed());
    }
}
