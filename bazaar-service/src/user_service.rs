use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use bazaar_core::ApiError;
use bazaar_data::repositories::{ModelRepository, UserRepository};
use bazaar_data::User;
use bazaar_security::{AuthenticatedUser, LocalIdentityProvider};

/// Administrative user management: listing, invites, deletion, and the
/// admin flag. Self-service signup lives on the identity provider.
#[derive(Clone)]
pub struct UserService {
    users: UserRepository,
    models: ModelRepository,
}

impl UserService {
    pub fn new(users: UserRepository, models: ModelRepository) -> Self {
        Self { users, models }
    }

    fn ensure_admin(user: &AuthenticatedUser) -> Result<(), ApiError> {
        if user.is_admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden("platform admin required".into()))
        }
    }

    pub async fn list(&self, caller: &AuthenticatedUser) -> Result<Vec<User>, ApiError> {
        Self::ensure_admin(caller)?;
        Ok(self.users.list().await?)
    }

    /// Admin invite: create an account with a preset password.
    pub async fn invite(
        &self,
        caller: &AuthenticatedUser,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, ApiError> {
        Self::ensure_admin(caller)?;
        if username.trim().is_empty() || email.trim().is_empty() {
            return Err(ApiError::InvalidRequest(
                "username and email are required".into(),
            ));
        }
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: Some(LocalIdentityProvider::hash_password(password).await?),
            is_admin: false,
            created_at: Utc::now(),
        };
        self.users.create(&user).await?;
        info!(user_id = %user.id, username, "user invited");
        Ok(user)
    }

    /// Delete a user. Memberships and API keys cascade; models owned by the
    /// user block the delete until transferred or removed.
    pub async fn delete(&self, caller: &AuthenticatedUser, user_id: Uuid) -> Result<(), ApiError> {
        Self::ensure_admin(caller)?;
        if caller.id == user_id {
            return Err(ApiError::Conflict("admins cannot delete themselves".into()));
        }
        if self.models.count_by_owner(user_id).await? > 0 {
            return Err(ApiError::Conflict(
                "user still owns models; transfer or delete them first".into(),
            ));
        }
        self.users.delete(user_id).await?;
        info!(user_id = %user_id, "user deleted");
        Ok(())
    }

    pub async fn set_admin(
        &self,
        caller: &AuthenticatedUser,
        user_id: Uuid,
        is_admin: bool,
    ) -> Result<(), ApiError> {
        Self::ensure_admin(caller)?;
        self.users.set_admin(user_id, is_admin).await?;
        info!(user_id = %user_id, is_admin, "admin flag updated");
        Ok(())
    }
}
