use bazaar_core::{JobKind, LogLevel};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::JobLogEntry;
use crate::error::{DataError, SqlxErrorExt};

/// Append-only log of job-level events per model, read back by the status
/// and log endpoints.
#[derive(Clone)]
pub struct JobLogRepository {
    pool: PgPool,
}

impl JobLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn append(
        &self,
        model_id: Uuid,
        job: JobKind,
        level: LogLevel,
        message: &str,
    ) -> Result<(), DataError> {
        sqlx::query(
            "INSERT INTO job_logs (model_id, job, level, message) VALUES ($1, $2, $3, $4)",
        )
        .bind(model_id)
        .bind(job.as_str())
        .bind(level.as_str())
        .bind(message)
        .execute(&self.pool)
        .await
        .map_err(|e| e.into_data_error())?;
        Ok(())
    }

    pub async fn for_model(
        &self,
        model_id: Uuid,
        job: JobKind,
    ) -> Result<Vec<JobLogEntry>, DataError> {
        sqlx::query_as::<_, JobLogEntry>(
            "SELECT id, model_id, job, level, message, created_at FROM job_logs \
             WHERE model_id = $1 AND job = $2 ORDER BY id",
        )
        .bind(model_id)
        .bind(job.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.into_data_error())
    }

    /// Messages at one level, as the status endpoints' `errors`/`warnings`
    /// arrays.
    pub async fn messages(
        &self,
        model_id: Uuid,
        job: JobKind,
        level: LogLevel,
    ) -> Result<Vec<String>, DataError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT message FROM job_logs \
             WHERE model_id = $1 AND job = $2 AND level = $3 ORDER BY id",
        )
        .bind(model_id)
        .bind(job.as_str())
        .bind(level.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.into_data_error())?;
        Ok(rows.into_iter().map(|(m,)| m).collect())
    }
}
