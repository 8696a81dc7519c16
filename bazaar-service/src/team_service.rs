use tracing::info;
use uuid::Uuid;

use bazaar_core::ApiError;
use bazaar_data::repositories::TeamRepository;
use bazaar_data::{Team, UserTeam};
use bazaar_security::AuthenticatedUser;

/// Team management: creation is platform-admin only, membership management
/// extends to team admins.
#[derive(Clone)]
pub struct TeamService {
    teams: TeamRepository,
}

impl TeamService {
    pub fn new(teams: TeamRepository) -> Self {
        Self { teams }
    }

    fn ensure_admin(user: &AuthenticatedUser) -> Result<(), ApiError> {
        if user.is_admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden("platform admin required".into()))
        }
    }

    async fn ensure_team_admin(
        &self,
        user: &AuthenticatedUser,
        team_id: Uuid,
    ) -> Result<(), ApiError> {
        if user.is_admin {
            return Ok(());
        }
        let memberships = self.teams.memberships(user.id).await?;
        let is_team_admin = memberships
            .iter()
            .any(|m| m.team_id == team_id && m.is_team_admin);
        if is_team_admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden("team admin required".into()))
        }
    }

    pub async fn create(&self, user: &AuthenticatedUser, name: &str) -> Result<Team, ApiError> {
        Self::ensure_admin(user)?;
        if name.trim().is_empty() {
            return Err(ApiError::InvalidRequest("team name must not be empty".into()));
        }
        let team = Team {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        self.teams.create(&team).await?;
        info!(team_id = %team.id, name, "team created");
        Ok(team)
    }

    pub async fn delete(&self, user: &AuthenticatedUser, team_id: Uuid) -> Result<(), ApiError> {
        Self::ensure_admin(user)?;
        self.teams.delete(team_id).await?;
        info!(team_id = %team_id, "team deleted");
        Ok(())
    }

    pub async fn add_member(
        &self,
        user: &AuthenticatedUser,
        team_id: Uuid,
        member_id: Uuid,
        is_team_admin: bool,
    ) -> Result<(), ApiError> {
        self.ensure_team_admin(user, team_id).await?;
        self.teams.find(team_id).await?;
        self.teams.add_member(team_id, member_id, is_team_admin).await?;
        Ok(())
    }

    pub async fn remove_member(
        &self,
        user: &AuthenticatedUser,
        team_id: Uuid,
        member_id: Uuid,
    ) -> Result<(), ApiError> {
        self.ensure_team_admin(user, team_id).await?;
        self.teams.remove_member(team_id, member_id).await?;
        Ok(())
    }

    pub async fn members(
        &self,
        user: &AuthenticatedUser,
        team_id: Uuid,
    ) -> Result<Vec<UserTeam>, ApiError> {
        if !user.is_admin {
            let memberships = self.teams.memberships(user.id).await?;
            if !memberships.iter().any(|m| m.team_id == team_id) {
                return Err(ApiError::Forbidden("not a member of this team".into()));
            }
        }
        Ok(self.teams.members(team_id).await?)
    }

    pub async fn list(&self, user: &AuthenticatedUser) -> Result<Vec<Team>, ApiError> {
        if user.is_admin {
            return Ok(self.teams.list().await?);
        }
        let memberships = self.teams.memberships(user.id).await?;
        let mut teams = Vec::with_capacity(memberships.len());
        for membership in memberships {
            teams.push(self.teams.find(membership.team_id).await?);
        }
        Ok(teams)
    }
}
