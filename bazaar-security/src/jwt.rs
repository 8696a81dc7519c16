use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SecurityError;

const USER_AUDIENCE: &str = "model-bazaar";

/// Default lifetime of a user token.
const USER_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Serialize, Deserialize)]
struct UserClaims {
    sub: Uuid,
    aud: String,
    exp: i64,
    iat: i64,
}

/// HS256 codec for user tokens issued by the local identity provider.
#[derive(Clone)]
pub struct UserTokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl UserTokenCodec {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Issue a token for a user id; returns the token and its lifetime in
    /// seconds.
    pub fn issue(&self, user_id: Uuid) -> Result<(String, i64), SecurityError> {
        let now = Utc::now().timestamp();
        let claims = UserClaims {
            sub: user_id,
            aud: USER_AUDIENCE.to_string(),
            exp: now + USER_TOKEN_TTL_SECS,
            iat: now,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| SecurityError::InvalidToken(e.to_string()))?;
        Ok((token, USER_TOKEN_TTL_SECS))
    }

    /// Validate a token and return the user id it was issued to.
    pub fn validate(&self, token: &str) -> Result<Uuid, SecurityError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[USER_AUDIENCE]);
        let data = decode::<UserClaims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => SecurityError::TokenExpired,
                _ => SecurityError::InvalidToken(e.to_string()),
            }
        })?;
        Ok(data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_round_trips() {
        let codec = UserTokenCodec::new("test-secret");
        let user_id = Uuid::new_v4();
        let (token, expires_in) = codec.issue(user_id).unwrap();
        assert_eq!(expires_in, USER_TOKEN_TTL_SECS);
        assert_eq!(codec.validate(&token).unwrap(), user_id);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let codec = UserTokenCodec::new("secret-a");
        let (token, _) = codec.issue(Uuid::new_v4()).unwrap();
        let other = UserTokenCodec::new("secret-b");
        assert!(matches!(
            other.validate(&token).unwrap_err(),
            SecurityError::InvalidToken(_)
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        let codec = UserTokenCodec::new("s");
        assert!(codec.validate("not-a-jwt").is_err());
    }
}
