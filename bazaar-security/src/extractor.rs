//! Axum extractors resolving the caller from request headers.
//!
//! Two credentials exist: user bearer tokens (JWT or API key) on the
//! `Authorization` header, and job-auth tokens on `X-Job-Auth`. Handlers
//! declare which one they need by parameter type.

use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::warn;

use bazaar_core::ApiError;
use bazaar_data::repositories::{ApiKeyRepository, UserRepository};

use crate::error::SecurityError;
use crate::identity::{AuthenticatedUser, IdentityProvider};
use crate::job_token::{JobClaims, JobTokenCodec};

/// Display prefix distinguishing API keys from JWTs.
pub const API_KEY_PREFIX: &str = "mbk_";

/// Header carrying job-auth tokens on internal routes.
pub const JOB_AUTH_HEADER: &str = "x-job-auth";

/// Everything the extractors need, provided once in the app state.
#[derive(Clone)]
pub struct AuthState {
    pub provider: Arc<dyn IdentityProvider>,
    pub api_keys: ApiKeyRepository,
    pub users: UserRepository,
    pub job_tokens: JobTokenCodec,
}

/// Extract the Bearer token from a header value.
fn parse_bearer(header_value: &str) -> Result<&str, SecurityError> {
    let mut parts = header_value.splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().ok_or(SecurityError::InvalidAuthScheme)?;
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return Err(SecurityError::InvalidAuthScheme);
    }
    Ok(token)
}

/// Extract the raw bearer token from request parts, without validating it.
pub fn bearer_token(parts: &Parts) -> Result<&str, SecurityError> {
    let header = parts.headers.get(AUTHORIZATION).ok_or_else(|| {
        warn!(uri = %parts.uri, "missing Authorization header");
        SecurityError::MissingAuthHeader
    })?;
    let value = header
        .to_str()
        .map_err(|_| SecurityError::InvalidAuthScheme)?;
    parse_bearer(value)
}

impl AuthState {
    /// Resolve a bearer credential — JWT or API key — to a user.
    pub async fn resolve(&self, token: &str) -> Result<AuthenticatedUser, SecurityError> {
        if token.starts_with(API_KEY_PREFIX) {
            return self.resolve_api_key(token).await;
        }
        self.provider.authenticate(token).await
    }

    async fn resolve_api_key(&self, token: &str) -> Result<AuthenticatedUser, SecurityError> {
        let hash = hex::encode(Sha256::digest(token.as_bytes()));
        let key = self
            .api_keys
            .find_by_hash(&hash)
            .await
            .map_err(|e| SecurityError::ProviderError(e.to_string()))?
            .ok_or_else(|| SecurityError::InvalidToken("unknown api key".into()))?;

        if let Some(expires_at) = key.expires_at {
            if Utc::now() > expires_at {
                return Err(SecurityError::TokenExpired);
            }
        }

        let user = self
            .users
            .find(key.user_id)
            .await
            .map_err(|_| SecurityError::InvalidToken("api key owner is gone".into()))?;

        // An empty scope list means the key covers all of the owner's
        // models; a non-empty one restricts the credential to exactly those.
        let allowed = self
            .api_keys
            .allowed_models(key.id)
            .await
            .map_err(|e| SecurityError::ProviderError(e.to_string()))?;
        Ok(AuthenticatedUser {
            id: user.id,
            username: user.username,
            email: user.email,
            is_admin: user.is_admin,
            model_scope: if allowed.is_empty() {
                None
            } else {
                Some(allowed)
            },
        })
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthState::from_ref(state);
        let token = bearer_token(parts)?;
        Ok(auth.resolve(token).await?)
    }
}

/// Extractor for job-auth tokens on internal routes.
#[derive(Clone, Copy, Debug)]
pub struct JobAuth(pub JobClaims);

impl<S> FromRequestParts<S> for JobAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthState::from_ref(state);
        let header = parts
            .headers
            .get(JOB_AUTH_HEADER)
            .ok_or(SecurityError::MissingAuthHeader)?;
        let token = header
            .to_str()
            .map_err(|_| SecurityError::InvalidAuthScheme)?;
        let claims = auth.job_tokens.validate(token)?;
        Ok(JobAuth(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_parsing_accepts_case_insensitive_scheme() {
        assert_eq!(parse_bearer("Bearer abc").unwrap(), "abc");
        assert_eq!(parse_bearer("bearer abc").unwrap(), "abc");
    }

    #[test]
    fn bearer_parsing_rejects_other_schemes() {
        assert!(matches!(
            parse_bearer("Basic dXNlcg==").unwrap_err(),
            SecurityError::InvalidAuthScheme
        ));
        assert!(matches!(
            parse_bearer("Bearer").unwrap_err(),
            SecurityError::InvalidAuthScheme
        ));
    }
}
