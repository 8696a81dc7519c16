use bazaar_core::{Access, Permission, Status};
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{Model, ModelAttribute, ModelDependency};
use crate::error::{DataError, SqlxErrorExt};
use crate::PgTransaction;

const MODEL_COLUMNS: &str = "id, user_id, team_id, name, model_type, train_status, \
     deploy_status, access, default_permission, published_date, base_model_id";

fn status_strings(statuses: &[Status]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

/// Everything needed to insert a model row; statuses start at `not_started`.
pub struct NewModel {
    pub id: Uuid,
    pub user_id: Uuid,
    pub team_id: Option<Uuid>,
    pub name: String,
    pub model_type: bazaar_core::ModelType,
    pub access: Access,
    pub default_permission: Permission,
    pub base_model_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct ModelRepository {
    pool: PgPool,
}

impl ModelRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a model row inside a caller-owned transaction, so attributes
    /// and dependencies land atomically with it.
    pub async fn create(
        &self,
        tx: &mut PgTransaction<'_>,
        model: &NewModel,
    ) -> Result<Model, DataError> {
        let row = sqlx::query_as::<_, Model>(&format!(
            "INSERT INTO models (id, user_id, team_id, name, model_type, train_status, \
             deploy_status, access, default_permission, published_date, base_model_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {MODEL_COLUMNS}"
        ))
        .bind(model.id)
        .bind(model.user_id)
        .bind(model.team_id)
        .bind(&model.name)
        .bind(model.model_type.as_str())
        .bind(Status::NotStarted.as_str())
        .bind(Status::NotStarted.as_str())
        .bind(model.access.as_str())
        .bind(model.default_permission.as_str())
        .bind(Utc::now())
        .bind(model.base_model_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| e.into_data_error())?;
        Ok(row)
    }

    pub async fn insert_attribute(
        &self,
        tx: &mut PgTransaction<'_>,
        model_id: Uuid,
        key: &str,
        value: &str,
    ) -> Result<(), DataError> {
        sqlx::query(
            "INSERT INTO model_attributes (model_id, key, value) VALUES ($1, $2, $3) \
             ON CONFLICT (model_id, key) DO UPDATE SET value = $3",
        )
        .bind(model_id)
        .bind(key)
        .bind(value)
        .execute(&mut **tx)
        .await
        .map_err(|e| e.into_data_error())?;
        Ok(())
    }

    pub async fn insert_dependency(
        &self,
        tx: &mut PgTransaction<'_>,
        model_id: Uuid,
        dependency_id: Uuid,
        position: i32,
    ) -> Result<(), DataError> {
        sqlx::query(
            "INSERT INTO model_dependencies (model_id, dependency_id, position) \
             VALUES ($1, $2, $3)",
        )
        .bind(model_id)
        .bind(dependency_id)
        .bind(position)
        .execute(&mut **tx)
        .await
        .map_err(|e| e.into_data_error())?;
        Ok(())
    }

    pub async fn find(&self, id: Uuid) -> Result<Model, DataError> {
        self.try_find(id)
            .await?
            .ok_or_else(|| DataError::NotFound(format!("model {id}")))
    }

    pub async fn try_find(&self, id: Uuid) -> Result<Option<Model>, DataError> {
        sqlx::query_as::<_, Model>(&format!("SELECT {MODEL_COLUMNS} FROM models WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| e.into_data_error())
    }

    pub async fn count_by_owner(&self, user_id: Uuid) -> Result<i64, DataError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM models WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.into_data_error())?;
        Ok(count)
    }

    pub async fn find_by_owner_and_name(
        &self,
        user_id: Uuid,
        name: &str,
    ) -> Result<Option<Model>, DataError> {
        sqlx::query_as::<_, Model>(&format!(
            "SELECT {MODEL_COLUMNS} FROM models WHERE user_id = $1 AND name = $2"
        ))
        .bind(user_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| e.into_data_error())
    }

    /// Row-lock a model for the duration of a transition transaction.
    pub async fn lock(
        &self,
        tx: &mut PgTransaction<'_>,
        id: Uuid,
    ) -> Result<Model, DataError> {
        sqlx::query_as::<_, Model>(&format!(
            "SELECT {MODEL_COLUMNS} FROM models WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| e.into_data_error())?
        .ok_or_else(|| DataError::NotFound(format!("model {id}")))
    }

    pub async fn set_train_status(
        &self,
        tx: &mut PgTransaction<'_>,
        id: Uuid,
        to: Status,
    ) -> Result<(), DataError> {
        sqlx::query("UPDATE models SET train_status = $2 WHERE id = $1")
            .bind(id)
            .bind(to.as_str())
            .execute(&mut **tx)
            .await
            .map_err(|e| e.into_data_error())?;
        Ok(())
    }

    pub async fn set_deploy_status(
        &self,
        tx: &mut PgTransaction<'_>,
        id: Uuid,
        to: Status,
    ) -> Result<(), DataError> {
        sqlx::query("UPDATE models SET deploy_status = $2 WHERE id = $1")
            .bind(id)
            .bind(to.as_str())
            .execute(&mut **tx)
            .await
            .map_err(|e| e.into_data_error())?;
        Ok(())
    }

    /// Compare-and-set a train status. Returns `false` when the row was not
    /// in any of the expected states, which callers treat as "someone got
    /// there first".
    pub async fn cas_train_status(
        &self,
        id: Uuid,
        from: &[Status],
        to: Status,
    ) -> Result<bool, DataError> {
        let result = sqlx::query(
            "UPDATE models SET train_status = $2 WHERE id = $1 AND train_status = ANY($3)",
        )
        .bind(id)
        .bind(to.as_str())
        .bind(status_strings(from))
        .execute(&self.pool)
        .await
        .map_err(|e| e.into_data_error())?;
        Ok(result.rows_affected() > 0)
    }

    /// Compare-and-set a deploy status; see [`cas_train_status`](Self::cas_train_status).
    pub async fn cas_deploy_status(
        &self,
        id: Uuid,
        from: &[Status],
        to: Status,
    ) -> Result<bool, DataError> {
        let result = sqlx::query(
            "UPDATE models SET deploy_status = $2 WHERE id = $1 AND deploy_status = ANY($3)",
        )
        .bind(id)
        .bind(to.as_str())
        .bind(status_strings(from))
        .execute(&self.pool)
        .await
        .map_err(|e| e.into_data_error())?;
        Ok(result.rows_affected() > 0)
    }

    /// Models with a non-terminal train or deploy status, the synchronizer's
    /// working set.
    pub async fn list_non_terminal(&self) -> Result<Vec<Model>, DataError> {
        let live = status_strings(&[Status::Starting, Status::InProgress]);
        sqlx::query_as::<_, Model>(&format!(
            "SELECT {MODEL_COLUMNS} FROM models \
             WHERE train_status = ANY($1) OR deploy_status = ANY($1)"
        ))
        .bind(live)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.into_data_error())
    }

    /// Models visible to a user: owned, public, shared through one of the
    /// user's teams, or granted explicitly.
    pub async fn list_visible(
        &self,
        user_id: Uuid,
        team_ids: &[Uuid],
    ) -> Result<Vec<Model>, DataError> {
        sqlx::query_as::<_, Model>(&format!(
            "SELECT DISTINCT m.* FROM (SELECT {MODEL_COLUMNS} FROM models) m \
             LEFT JOIN model_permissions p ON p.model_id = m.id AND p.user_id = $1 \
             WHERE m.user_id = $1 \
                OR m.access = 'public' \
                OR (m.access = 'protected' AND m.team_id = ANY($2)) \
                OR p.user_id IS NOT NULL \
             ORDER BY m.published_date DESC"
        ))
        .bind(user_id)
        .bind(team_ids.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.into_data_error())
    }

    pub async fn attributes(&self, model_id: Uuid) -> Result<Vec<ModelAttribute>, DataError> {
        sqlx::query_as::<_, ModelAttribute>(
            "SELECT model_id, key, value FROM model_attributes WHERE model_id = $1 ORDER BY key",
        )
        .bind(model_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.into_data_error())
    }

    /// Dependencies in insertion order; the order defines evaluation order.
    pub async fn dependencies(&self, model_id: Uuid) -> Result<Vec<ModelDependency>, DataError> {
        sqlx::query_as::<_, ModelDependency>(
            "SELECT model_id, dependency_id, position FROM model_dependencies \
             WHERE model_id = $1 ORDER BY position",
        )
        .bind(model_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.into_data_error())
    }

    /// How many models compose this one in, counted under the delete lock.
    pub async fn dependent_count(
        &self,
        tx: &mut PgTransaction<'_>,
        id: Uuid,
    ) -> Result<i64, DataError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM model_dependencies WHERE dependency_id = $1")
                .bind(id)
                .fetch_one(&mut **tx)
                .await
                .map_err(|e| e.into_data_error())?;
        Ok(count)
    }

    /// How many models name this one as their base, counted under the delete lock.
    pub async fn descendant_count(
        &self,
        tx: &mut PgTransaction<'_>,
        id: Uuid,
    ) -> Result<i64, DataError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM models WHERE base_model_id = $1")
                .bind(id)
                .fetch_one(&mut **tx)
                .await
                .map_err(|e| e.into_data_error())?;
        Ok(count)
    }

    /// Delete the model row; attributes, dependencies, logs, and permissions
    /// cascade at the schema level.
    pub async fn delete(&self, tx: &mut PgTransaction<'_>, id: Uuid) -> Result<(), DataError> {
        let result = sqlx::query("DELETE FROM models WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(|e| e.into_data_error())?;
        if result.rows_affected() == 0 {
            return Err(DataError::NotFound(format!("model {id}")));
        }
        Ok(())
    }

    pub async fn rename(&self, id: Uuid, name: &str) -> Result<(), DataError> {
        let result = sqlx::query("UPDATE models SET name = $2 WHERE id = $1")
            .bind(id)
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| e.into_data_error())?;
        if result.rows_affected() == 0 {
            return Err(DataError::NotFound(format!("model {id}")));
        }
        Ok(())
    }

    pub async fn set_access(
        &self,
        id: Uuid,
        access: Access,
        default_permission: Permission,
    ) -> Result<(), DataError> {
        let result =
            sqlx::query("UPDATE models SET access = $2, default_permission = $3 WHERE id = $1")
                .bind(id)
                .bind(access.as_str())
                .bind(default_permission.as_str())
                .execute(&self.pool)
                .await
                .map_err(|e| e.into_data_error())?;
        if result.rows_affected() == 0 {
            return Err(DataError::NotFound(format!("model {id}")));
        }
        Ok(())
    }

    pub async fn set_team(&self, id: Uuid, team_id: Option<Uuid>) -> Result<(), DataError> {
        let result = sqlx::query("UPDATE models SET team_id = $2 WHERE id = $1")
            .bind(id)
            .bind(team_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.into_data_error())?;
        if result.rows_affected() == 0 {
            return Err(DataError::NotFound(format!("model {id}")));
        }
        Ok(())
    }

    /// Explicit per-user grant on a model.
    pub async fn grant(
        &self,
        model_id: Uuid,
        user_id: Uuid,
        permission: Permission,
    ) -> Result<(), DataError> {
        sqlx::query(
            "INSERT INTO model_permissions (model_id, user_id, permission) VALUES ($1, $2, $3) \
             ON CONFLICT (model_id, user_id) DO UPDATE SET permission = $3",
        )
        .bind(model_id)
        .bind(user_id)
        .bind(permission.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| e.into_data_error())?;
        Ok(())
    }

    pub async fn revoke(&self, model_id: Uuid, user_id: Uuid) -> Result<(), DataError> {
        sqlx::query("DELETE FROM model_permissions WHERE model_id = $1 AND user_id = $2")
            .bind(model_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.into_data_error())?;
        Ok(())
    }

    pub async fn granted_permission(
        &self,
        model_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Permission>, DataError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT permission FROM model_permissions WHERE model_id = $1 AND user_id = $2",
        )
        .bind(model_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| e.into_data_error())?;
        Ok(row.and_then(|(p,)| Permission::parse(&p)))
    }
}
