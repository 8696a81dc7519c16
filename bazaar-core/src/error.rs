use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Helper to create a JSON error response with a standard `{ "error": message }` body.
fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = serde_json::json!({ "error": message.into() });
    (status, Json(body)).into_response()
}

/// The error taxonomy surfaced by every service operation.
///
/// Repositories and clients return their own typed errors; the service layer
/// maps them into one of these kinds, and the HTTP layer maps each kind to a
/// status code via [`IntoResponse`].
pub enum ApiError {
    /// Malformed body, missing field, invalid enum value (400).
    InvalidRequest(String),
    /// Missing or unparseable credentials (401).
    Unauthorized(String),
    /// Authenticated but not allowed (403).
    Forbidden(String),
    /// No such model/user/team/upload (404).
    NotFound(String),
    /// Invariant violation: name taken, dependency cycle, illegal transition (409).
    Conflict(String),
    /// License expired, CPU ceiling exceeded, model not trained yet (412).
    FailedPrecondition(String),
    /// Orchestrator/storage/database transient failure after retry (503).
    DependencyUnavailable(String),
    /// Unexpected (500).
    Internal(String),
}

impl ApiError {
    /// The HTTP status code this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::FailedPrecondition(_) => StatusCode::PRECONDITION_FAILED,
            ApiError::DependencyUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message carried by this error.
    pub fn message(&self) -> &str {
        match self {
            ApiError::InvalidRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::FailedPrecondition(msg)
            | ApiError::DependencyUnavailable(msg)
            | ApiError::Internal(msg) => msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.message(), "request failed");
        }
        error_response(status, self.message().to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {msg}"),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            ApiError::NotFound(msg) => write!(f, "Not found: {msg}"),
            ApiError::Conflict(msg) => write!(f, "Conflict: {msg}"),
            ApiError::FailedPrecondition(msg) => write!(f, "Failed precondition: {msg}"),
            ApiError::DependencyUnavailable(msg) => write!(f, "Dependency unavailable: {msg}"),
            ApiError::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::fmt::Debug for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Self as std::fmt::Display>::fmt(self, f)
    }
}

impl std::error::Error for ApiError {}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn error_parts(err: ApiError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        (status, json)
    }

    #[tokio::test]
    async fn not_found_maps_to_404() {
        let (status, body) = error_parts(ApiError::NotFound("no such model".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "no such model");
    }

    #[tokio::test]
    async fn conflict_maps_to_409() {
        let (status, body) = error_parts(ApiError::Conflict("name taken".into())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "name taken");
    }

    #[tokio::test]
    async fn failed_precondition_maps_to_412() {
        let (status, _) = error_parts(ApiError::FailedPrecondition("train first".into())).await;
        assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    }

    #[tokio::test]
    async fn dependency_unavailable_maps_to_503() {
        let (status, _) =
            error_parts(ApiError::DependencyUnavailable("orchestrator down".into())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn display_formatting() {
        assert_eq!(
            ApiError::Conflict("x".into()).to_string(),
            "Conflict: x"
        );
        assert_eq!(
            ApiError::FailedPrecondition("y".into()).to_string(),
            "Failed precondition: y"
        );
    }
}
