use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{Team, UserTeam};
use crate::error::{DataError, SqlxErrorExt};

#[derive(Clone)]
pub struct TeamRepository {
    pool: PgPool,
}

impl TeamRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, team: &Team) -> Result<(), DataError> {
        sqlx::query("INSERT INTO teams (id, name) VALUES ($1, $2)")
            .bind(team.id)
            .bind(&team.name)
            .execute(&self.pool)
            .await
            .map_err(|e| e.into_data_error())?;
        Ok(())
    }

    pub async fn find(&self, id: Uuid) -> Result<Team, DataError> {
        sqlx::query_as::<_, Team>("SELECT id, name FROM teams WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| e.into_data_error())?
            .ok_or_else(|| DataError::NotFound(format!("team {id}")))
    }

    pub async fn list(&self) -> Result<Vec<Team>, DataError> {
        sqlx::query_as::<_, Team>("SELECT id, name FROM teams ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.into_data_error())
    }

    /// Delete a team. Memberships cascade; models referencing it are
    /// disassociated by the schema's `ON DELETE SET NULL`.
    pub async fn delete(&self, id: Uuid) -> Result<(), DataError> {
        let result = sqlx::query("DELETE FROM teams WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.into_data_error())?;
        if result.rows_affected() == 0 {
            return Err(DataError::NotFound(format!("team {id}")));
        }
        Ok(())
    }

    /// Add a member, or update the admin flag of an existing membership.
    /// The primary key keeps memberships unique per (user, team).
    pub async fn add_member(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        is_team_admin: bool,
    ) -> Result<(), DataError> {
        sqlx::query(
            "INSERT INTO user_teams (user_id, team_id, is_team_admin) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, team_id) DO UPDATE SET is_team_admin = $3",
        )
        .bind(user_id)
        .bind(team_id)
        .bind(is_team_admin)
        .execute(&self.pool)
        .await
        .map_err(|e| e.into_data_error())?;
        Ok(())
    }

    pub async fn remove_member(&self, team_id: Uuid, user_id: Uuid) -> Result<(), DataError> {
        let result = sqlx::query("DELETE FROM user_teams WHERE team_id = $1 AND user_id = $2")
            .bind(team_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.into_data_error())?;
        if result.rows_affected() == 0 {
            return Err(DataError::NotFound(format!(
                "user {user_id} in team {team_id}"
            )));
        }
        Ok(())
    }

    pub async fn members(&self, team_id: Uuid) -> Result<Vec<UserTeam>, DataError> {
        sqlx::query_as::<_, UserTeam>(
            "SELECT user_id, team_id, is_team_admin FROM user_teams WHERE team_id = $1",
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.into_data_error())
    }

    /// All memberships of one user, for permission evaluation.
    pub async fn memberships(&self, user_id: Uuid) -> Result<Vec<UserTeam>, DataError> {
        sqlx::query_as::<_, UserTeam>(
            "SELECT user_id, team_id, is_team_admin FROM user_teams WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.into_data_error())
    }
}
