use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::ApiKey;
use crate::error::{DataError, SqlxErrorExt};

const KEY_COLUMNS: &str = "id, user_id, key_hash, prefix, created_at, expires_at";

/// API keys are created once, never mutated, and deletable by their owner.
#[derive(Clone)]
pub struct ApiKeyRepository {
    pool: PgPool,
}

impl ApiKeyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, key: &ApiKey, allowed_models: &[Uuid]) -> Result<(), DataError> {
        let mut tx = self.pool.begin().await.map_err(|e| e.into_data_error())?;
        sqlx::query(
            "INSERT INTO api_keys (id, user_id, key_hash, prefix, created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(key.id)
        .bind(key.user_id)
        .bind(&key.key_hash)
        .bind(&key.prefix)
        .bind(key.created_at)
        .bind(key.expires_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| e.into_data_error())?;

        for model_id in allowed_models {
            sqlx::query("INSERT INTO api_key_models (api_key_id, model_id) VALUES ($1, $2)")
                .bind(key.id)
                .bind(model_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| e.into_data_error())?;
        }
        tx.commit().await.map_err(|e| e.into_data_error())?;
        Ok(())
    }

    pub async fn find_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, DataError> {
        sqlx::query_as::<_, ApiKey>(&format!(
            "SELECT {KEY_COLUMNS} FROM api_keys WHERE key_hash = $1"
        ))
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| e.into_data_error())
    }

    pub async fn list_by_owner(&self, user_id: Uuid) -> Result<Vec<ApiKey>, DataError> {
        sqlx::query_as::<_, ApiKey>(&format!(
            "SELECT {KEY_COLUMNS} FROM api_keys WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.into_data_error())
    }

    /// Models a key is scoped to; empty means all of the owner's models.
    pub async fn allowed_models(&self, api_key_id: Uuid) -> Result<Vec<Uuid>, DataError> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT model_id FROM api_key_models WHERE api_key_id = $1")
                .bind(api_key_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| e.into_data_error())?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<(), DataError> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.into_data_error())?;
        if result.rows_affected() == 0 {
            return Err(DataError::NotFound(format!("api key {id}")));
        }
        Ok(())
    }
}
