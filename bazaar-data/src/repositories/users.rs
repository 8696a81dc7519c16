use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::User;
use crate::error::{DataError, SqlxErrorExt};

const USER_COLUMNS: &str = "id, username, email, password_hash, is_admin, created_at";

#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user: &User) -> Result<(), DataError> {
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, is_admin, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_admin)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| e.into_data_error())?;
        Ok(())
    }

    pub async fn find(&self, id: Uuid) -> Result<User, DataError> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| e.into_data_error())?
            .ok_or_else(|| DataError::NotFound(format!("user {id}")))
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, DataError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| e.into_data_error())
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, DataError> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| e.into_data_error())
    }

    pub async fn list(&self) -> Result<Vec<User>, DataError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY username"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.into_data_error())
    }

    /// Delete a user. Memberships and API keys cascade; owned models do not,
    /// so a user who still owns models comes back as `Conflict`.
    pub async fn delete(&self, id: Uuid) -> Result<(), DataError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.into_data_error())?;
        if result.rows_affected() == 0 {
            return Err(DataError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    pub async fn set_admin(&self, id: Uuid, is_admin: bool) -> Result<(), DataError> {
        let result = sqlx::query("UPDATE users SET is_admin = $2 WHERE id = $1")
            .bind(id)
            .bind(is_admin)
            .execute(&self.pool)
            .await
            .map_err(|e| e.into_data_error())?;
        if result.rows_affected() == 0 {
            return Err(DataError::NotFound(format!("user {id}")));
        }
        Ok(())
    }
}
