/// Errors surfaced by orchestrator clients.
///
/// Backend-specific failures (HTTP codes, API bodies) are mapped onto these
/// kinds at the client boundary so lifecycle code never inspects scheduler
/// responses.
#[derive(Debug)]
pub enum OrchestratorError {
    /// The named job is unknown to the scheduler.
    JobNotFound(String),
    /// The connection failed or timed out before a response arrived.
    Transport(String),
    /// The scheduler answered with a non-success status.
    Api { status: u16, message: String },
    /// The job payload does not match this backend.
    InvalidJob(String),
}

impl OrchestratorError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        OrchestratorError::Transport(err.to_string())
    }

    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            OrchestratorError::Transport(_) => true,
            OrchestratorError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl std::fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrchestratorError::JobNotFound(name) => write!(f, "job not found: {name}"),
            OrchestratorError::Transport(msg) => write!(f, "orchestrator unreachable: {msg}"),
            OrchestratorError::Api { status, message } => {
                write!(f, "orchestrator api error ({status}): {message}")
            }
            OrchestratorError::InvalidJob(msg) => write!(f, "invalid job payload: {msg}"),
        }
    }
}

impl std::error::Error for OrchestratorError {}
