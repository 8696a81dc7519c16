use bazaar_core::JobKind;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SecurityError;

const JOB_AUDIENCE: &str = "bazaar-job";

/// What a job token is scoped to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JobClaims {
    pub model_id: Uuid,
    pub job_kind: JobKind,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawJobClaims {
    sub: Uuid,
    aud: String,
    job: String,
    exp: i64,
    iat: i64,
}

/// Codec for job-auth tokens: signed `(model_id, job_kind, expiry)` triples
/// carried by running jobs when they call back into the control plane.
///
/// The save flow's "update token" is a job token for the freshly created
/// model; one-time use falls out of the state machine, since the finalizing
/// transition only fires from `in_progress`.
#[derive(Clone)]
pub struct JobTokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JobTokenCodec {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Issue a token scoped to one model and job kind, valid for `ttl_secs`.
    pub fn issue(
        &self,
        model_id: Uuid,
        job_kind: JobKind,
        ttl_secs: i64,
    ) -> Result<String, SecurityError> {
        let now = Utc::now().timestamp();
        let claims = RawJobClaims {
            sub: model_id,
            aud: JOB_AUDIENCE.to_string(),
            job: job_kind.as_str().to_string(),
            exp: now + ttl_secs,
            iat: now,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| SecurityError::InvalidToken(e.to_string()))
    }

    pub fn validate(&self, token: &str) -> Result<JobClaims, SecurityError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[JOB_AUDIENCE]);
        let data = decode::<RawJobClaims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => SecurityError::TokenExpired,
                _ => SecurityError::InvalidToken(e.to_string()),
            }
        })?;
        let job_kind = JobKind::parse(&data.claims.job)
            .ok_or_else(|| SecurityError::InvalidToken(format!("unknown job kind {}", data.claims.job)))?;
        Ok(JobClaims {
            model_id: data.claims.sub,
            job_kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_token_round_trips() {
        let codec = JobTokenCodec::new("secret");
        let model_id = Uuid::new_v4();
        let token = codec.issue(model_id, JobKind::Deploy, 3600).unwrap();
        let claims = codec.validate(&token).unwrap();
        assert_eq!(claims.model_id, model_id);
        assert_eq!(claims.job_kind, JobKind::Deploy);
    }

    #[test]
    fn user_tokens_are_not_job_tokens() {
        // Same secret, different audience: a user token must not authorize
        // job callbacks.
        let user_codec = crate::jwt::UserTokenCodec::new("secret");
        let (token, _) = user_codec.issue(Uuid::new_v4()).unwrap();
        let job_codec = JobTokenCodec::new("secret");
        assert!(job_codec.validate(&token).is_err());
    }

    #[test]
    fn expired_job_token_is_rejected() {
        let codec = JobTokenCodec::new("secret");
        let token = codec.issue(Uuid::new_v4(), JobKind::Train, -120).unwrap();
        assert!(matches!(
            codec.validate(&token).unwrap_err(),
            SecurityError::TokenExpired
        ));
    }
}
