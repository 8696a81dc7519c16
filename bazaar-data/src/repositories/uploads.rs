use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::Upload;
use crate::error::{DataError, SqlxErrorExt};

#[derive(Clone)]
pub struct UploadRepository {
    pool: PgPool,
}

impl UploadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, upload: &Upload) -> Result<(), DataError> {
        sqlx::query("INSERT INTO uploads (id, user_id, created_at) VALUES ($1, $2, $3)")
            .bind(upload.id)
            .bind(upload.user_id)
            .bind(upload.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| e.into_data_error())?;
        Ok(())
    }

    pub async fn find(&self, id: Uuid) -> Result<Upload, DataError> {
        sqlx::query_as::<_, Upload>("SELECT id, user_id, created_at FROM uploads WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| e.into_data_error())?
            .ok_or_else(|| DataError::NotFound(format!("upload {id}")))
    }

    pub async fn list_by_owner(&self, user_id: Uuid) -> Result<Vec<Upload>, DataError> {
        sqlx::query_as::<_, Upload>(
            "SELECT id, user_id, created_at FROM uploads WHERE user_id = $1 \
             ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.into_data_error())
    }

    /// Drop the row once the staged files were consumed by a train request.
    pub async fn delete(&self, id: Uuid) -> Result<(), DataError> {
        let result = sqlx::query("DELETE FROM uploads WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.into_data_error())?;
        if result.rows_affected() == 0 {
            return Err(DataError::NotFound(format!("upload {id}")));
        }
        Ok(())
    }
}
