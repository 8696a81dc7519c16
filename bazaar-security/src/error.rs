use bazaar_core::ApiError;

/// Security-related errors for authentication and token validation.
#[derive(Debug)]
pub enum SecurityError {
    /// The Authorization header is missing from the request.
    MissingAuthHeader,
    /// The authorization scheme is not "Bearer".
    InvalidAuthScheme,
    /// The token is malformed or its signature does not verify.
    InvalidToken(String),
    /// The token has expired.
    TokenExpired,
    /// Username/password did not match.
    InvalidCredentials,
    /// The identity provider rejected or cannot perform the operation.
    ProviderError(String),
}

impl std::fmt::Display for SecurityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecurityError::MissingAuthHeader => write!(f, "missing Authorization header"),
            SecurityError::InvalidAuthScheme => write!(f, "invalid authorization scheme"),
            SecurityError::InvalidToken(msg) => write!(f, "invalid token: {msg}"),
            SecurityError::TokenExpired => write!(f, "token expired"),
            SecurityError::InvalidCredentials => write!(f, "invalid credentials"),
            SecurityError::ProviderError(msg) => write!(f, "identity provider error: {msg}"),
        }
    }
}

impl std::error::Error for SecurityError {}

impl From<SecurityError> for ApiError {
    fn from(err: SecurityError) -> Self {
        match err {
            SecurityError::ProviderError(msg) => ApiError::DependencyUnavailable(msg),
            other => ApiError::Unauthorized(other.to_string()),
        }
    }
}
