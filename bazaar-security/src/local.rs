use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use bazaar_data::repositories::UserRepository;
use bazaar_data::User;

use crate::error::SecurityError;
use crate::identity::{AuthenticatedUser, IdentityProvider, IssuedToken};
use crate::jwt::UserTokenCodec;

/// Identity provider backed by the local `users` table.
///
/// Passwords are argon2-hashed; tokens are HS256 user tokens from
/// [`UserTokenCodec`]. Hashing and verification run on the blocking pool.
#[derive(Clone)]
pub struct LocalIdentityProvider {
    users: UserRepository,
    codec: UserTokenCodec,
}

impl LocalIdentityProvider {
    pub fn new(users: UserRepository, codec: UserTokenCodec) -> Self {
        Self { users, codec }
    }

    pub async fn hash_password(password: &str) -> Result<String, SecurityError> {
        let password = password.to_string();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            Argon2::default()
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| SecurityError::ProviderError(e.to_string()))
        })
        .await
        .map_err(|e| SecurityError::ProviderError(e.to_string()))?
    }

    async fn verify_password(hash: String, password: String) -> bool {
        tokio::task::spawn_blocking(move || {
            let Ok(parsed) = PasswordHash::new(&hash) else {
                return false;
            };
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .await
        .unwrap_or(false)
    }

    /// Ensure the bootstrap admin account exists; idempotent across restarts.
    pub async fn ensure_admin(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(), SecurityError> {
        if self
            .users
            .find_by_username(username)
            .await
            .map_err(|e| SecurityError::ProviderError(e.to_string()))?
            .is_some()
        {
            return Ok(());
        }
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: Some(Self::hash_password(password).await?),
            is_admin: true,
            created_at: Utc::now(),
        };
        self.users
            .create(&user)
            .await
            .map_err(|e| SecurityError::ProviderError(e.to_string()))?;
        info!(username, "bootstrap admin created");
        Ok(())
    }
}

#[async_trait::async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn login(&self, username: &str, password: &str) -> Result<IssuedToken, SecurityError> {
        let user = self
            .users
            .find_by_username(username)
            .await
            .map_err(|e| SecurityError::ProviderError(e.to_string()))?
            .ok_or(SecurityError::InvalidCredentials)?;

        let Some(hash) = user.password_hash.clone() else {
            // Account was created through a federated provider.
            return Err(SecurityError::InvalidCredentials);
        };
        if !Self::verify_password(hash, password.to_string()).await {
            return Err(SecurityError::InvalidCredentials);
        }

        let (access_token, expires_in) = self.codec.issue(user.id)?;
        Ok(IssuedToken {
            access_token,
            expires_in,
        })
    }

    async fn signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<IssuedToken, SecurityError> {
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: Some(Self::hash_password(password).await?),
            is_admin: false,
            created_at: Utc::now(),
        };
        self.users.create(&user).await.map_err(|e| match e {
            bazaar_data::DataError::Conflict(_) => {
                SecurityError::ProviderError("username or email already taken".into())
            }
            other => SecurityError::ProviderError(other.to_string()),
        })?;

        let (access_token, expires_in) = self.codec.issue(user.id)?;
        Ok(IssuedToken {
            access_token,
            expires_in,
        })
    }

    async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, SecurityError> {
        let user_id = self.codec.validate(token)?;
        let user = self
            .users
            .find(user_id)
            .await
            .map_err(|_| SecurityError::InvalidToken("unknown user".into()))?;
        Ok(AuthenticatedUser {
            id: user.id,
            username: user.username,
            email: user.email,
            is_admin: user.is_admin,
            model_scope: None,
        })
    }
}
