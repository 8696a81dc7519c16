use chrono::{DateTime, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use bazaar_core::ApiError;
use bazaar_data::repositories::ApiKeyRepository;
use bazaar_data::ApiKey;
use bazaar_security::{AuthenticatedUser, API_KEY_PREFIX};

/// Bytes of entropy behind each key.
const KEY_BYTES: usize = 24;
/// Characters of the key shown in listings.
const PREFIX_CHARS: usize = 12;

/// API key issuance and revocation. The plaintext key exists exactly once,
/// in the creation response; only its hash is stored.
#[derive(Clone)]
pub struct ApiKeyService {
    keys: ApiKeyRepository,
}

impl ApiKeyService {
    pub fn new(keys: ApiKeyRepository) -> Self {
        Self { keys }
    }

    pub async fn create(
        &self,
        user: &AuthenticatedUser,
        expires_at: Option<DateTime<Utc>>,
        allowed_models: Vec<Uuid>,
    ) -> Result<(ApiKey, String), ApiError> {
        // A model-scoped key must not mint keys of wider scope than itself.
        if !user.can_create() {
            return Err(ApiError::Forbidden(
                "api key is scoped to specific models".into(),
            ));
        }
        if let Some(expiry) = expires_at {
            if expiry <= Utc::now() {
                return Err(ApiError::InvalidRequest("expiry is in the past".into()));
            }
        }

        let mut secret = [0u8; KEY_BYTES];
        rand::thread_rng().fill_bytes(&mut secret);
        let plaintext = format!("{API_KEY_PREFIX}{}", hex::encode(secret));

        let key = ApiKey {
            id: Uuid::new_v4(),
            user_id: user.id,
            key_hash: hex::encode(Sha256::digest(plaintext.as_bytes())),
            prefix: plaintext[..PREFIX_CHARS].to_string(),
            created_at: Utc::now(),
            expires_at,
        };
        self.keys.create(&key, &allowed_models).await?;
        info!(key_id = %key.id, user_id = %user.id, "api key created");
        Ok((key, plaintext))
    }

    pub async fn list(&self, user: &AuthenticatedUser) -> Result<Vec<ApiKey>, ApiError> {
        Ok(self.keys.list_by_owner(user.id).await?)
    }

    pub async fn delete(&self, user: &AuthenticatedUser, key_id: Uuid) -> Result<(), ApiError> {
        self.keys.delete(key_id, user.id).await?;
        info!(key_id = %key_id, "api key deleted");
        Ok(())
    }
}
