//! The permission evaluator: a pure function over already-loaded rows.
//!
//! Callers fetch the model, the user's team memberships, and any explicit
//! grant, then ask for the effective permission. Keeping the rules free of
//! I/O makes every branch unit-testable.

use bazaar_core::{Access, Permission};
use bazaar_data::{Model, UserTeam};

use crate::identity::AuthenticatedUser;

/// Everything the evaluator looks at.
pub struct PermissionInput<'a> {
    pub user: &'a AuthenticatedUser,
    pub model: &'a Model,
    /// The user's team memberships (all of them, not just the model's team).
    pub memberships: &'a [UserTeam],
    /// Explicit per-user grant on this model, if any.
    pub granted: Option<Permission>,
}

/// Effective permission of a user on a model, or `None` for no access.
///
/// Rules, strongest first:
/// - a credential scoped to specific models (API-key scope) sees nothing
///   outside that scope, regardless of every rule below
/// - platform admins and the owner hold `write`
/// - an explicit grant holds exactly its level
/// - `protected` models extend the model's default permission to members of
///   the model's team; team admins get `write`
/// - `public` models grant `read` to any authenticated user
pub fn evaluate_permission(input: &PermissionInput<'_>) -> Option<Permission> {
    let PermissionInput {
        user,
        model,
        memberships,
        granted,
    } = input;

    if !user.in_scope(model.id) {
        return None;
    }

    if user.is_admin || model.user_id == user.id {
        return Some(Permission::Write);
    }

    let mut best: Option<Permission> = *granted;

    if model.access() == Access::Protected {
        if let Some(team_id) = model.team_id {
            if let Some(membership) = memberships.iter().find(|m| m.team_id == team_id) {
                let team_level = if membership.is_team_admin {
                    Permission::Write
                } else {
                    model.default_permission()
                };
                best = Some(best.map_or(team_level, |b| b.max(team_level)));
            }
        }
    }

    if model.access() == Access::Public {
        best = Some(best.map_or(Permission::Read, |b| b.max(Permission::Read)));
    }

    best
}

/// Convenience predicate for routes requiring `read`.
pub fn can_read(input: &PermissionInput<'_>) -> bool {
    evaluate_permission(input).is_some()
}

/// Convenience predicate for routes requiring `write`.
pub fn can_write(input: &PermissionInput<'_>) -> bool {
    evaluate_permission(input) == Some(Permission::Write)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn user(is_admin: bool) -> AuthenticatedUser {
        AuthenticatedUser {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            is_admin,
            model_scope: None,
        }
    }

    fn model(owner: Uuid, access: Access, default_permission: Permission) -> Model {
        Model {
            id: Uuid::new_v4(),
            user_id: owner,
            team_id: None,
            name: "m".into(),
            model_type: "ndb".into(),
            train_status: "complete".into(),
            deploy_status: "not_started".into(),
            access: access.as_str().into(),
            default_permission: default_permission.as_str().into(),
            published_date: Utc::now(),
            base_model_id: None,
        }
    }

    fn membership(user_id: Uuid, team_id: Uuid, is_team_admin: bool) -> UserTeam {
        UserTeam {
            user_id,
            team_id,
            is_team_admin,
        }
    }

    #[test]
    fn owner_always_writes() {
        let alice = user(false);
        let m = model(alice.id, Access::Private, Permission::Read);
        let input = PermissionInput {
            user: &alice,
            model: &m,
            memberships: &[],
            granted: None,
        };
        assert_eq!(evaluate_permission(&input), Some(Permission::Write));
    }

    #[test]
    fn admin_always_writes() {
        let admin = user(true);
        let m = model(Uuid::new_v4(), Access::Private, Permission::Read);
        let input = PermissionInput {
            user: &admin,
            model: &m,
            memberships: &[],
            granted: None,
        };
        assert_eq!(evaluate_permission(&input), Some(Permission::Write));
    }

    #[test]
    fn private_model_is_invisible_to_strangers() {
        let alice = user(false);
        let m = model(Uuid::new_v4(), Access::Private, Permission::Write);
        let input = PermissionInput {
            user: &alice,
            model: &m,
            memberships: &[],
            granted: None,
        };
        assert_eq!(evaluate_permission(&input), None);
        assert!(!can_read(&input));
    }

    #[test]
    fn public_model_grants_read_to_anyone() {
        let alice = user(false);
        let m = model(Uuid::new_v4(), Access::Public, Permission::Write);
        let input = PermissionInput {
            user: &alice,
            model: &m,
            memberships: &[],
            granted: None,
        };
        assert_eq!(evaluate_permission(&input), Some(Permission::Read));
        assert!(can_read(&input));
        assert!(!can_write(&input));
    }

    #[test]
    fn protected_model_follows_team_membership() {
        let alice = user(false);
        let team_id = Uuid::new_v4();
        let mut m = model(Uuid::new_v4(), Access::Protected, Permission::Read);
        m.team_id = Some(team_id);

        // Not a member: no access.
        let input = PermissionInput {
            user: &alice,
            model: &m,
            memberships: &[],
            granted: None,
        };
        assert_eq!(evaluate_permission(&input), None);

        // Member: default permission.
        let member = [membership(alice.id, team_id, false)];
        let input = PermissionInput {
            user: &alice,
            model: &m,
            memberships: &member,
            granted: None,
        };
        assert_eq!(evaluate_permission(&input), Some(Permission::Read));

        // Team admin: write regardless of the default.
        let admin_member = [membership(alice.id, team_id, true)];
        let input = PermissionInput {
            user: &alice,
            model: &m,
            memberships: &admin_member,
            granted: None,
        };
        assert_eq!(evaluate_permission(&input), Some(Permission::Write));
    }

    #[test]
    fn membership_in_another_team_does_not_help() {
        let alice = user(false);
        let mut m = model(Uuid::new_v4(), Access::Protected, Permission::Write);
        m.team_id = Some(Uuid::new_v4());
        let other = [membership(alice.id, Uuid::new_v4(), true)];
        let input = PermissionInput {
            user: &alice,
            model: &m,
            memberships: &other,
            granted: None,
        };
        assert_eq!(evaluate_permission(&input), None);
    }

    #[test]
    fn explicit_grant_wins_over_visibility() {
        let alice = user(false);
        let m = model(Uuid::new_v4(), Access::Private, Permission::Read);
        let input = PermissionInput {
            user: &alice,
            model: &m,
            memberships: &[],
            granted: Some(Permission::Write),
        };
        assert_eq!(evaluate_permission(&input), Some(Permission::Write));
    }

    #[test]
    fn scoped_credential_only_sees_its_models() {
        let mut alice = user(false);
        let owned = model(alice.id, Access::Private, Permission::Read);
        let other_owned = model(alice.id, Access::Private, Permission::Read);
        alice.model_scope = Some(vec![owned.id]);

        // In scope: the owner rules apply as usual.
        let input = PermissionInput {
            user: &alice,
            model: &owned,
            memberships: &[],
            granted: None,
        };
        assert_eq!(evaluate_permission(&input), Some(Permission::Write));

        // Out of scope: even the caller's own model is invisible.
        let input = PermissionInput {
            user: &alice,
            model: &other_owned,
            memberships: &[],
            granted: None,
        };
        assert_eq!(evaluate_permission(&input), None);
    }

    #[test]
    fn scope_overrides_public_and_admin() {
        let mut root = user(true);
        let public = model(Uuid::new_v4(), Access::Public, Permission::Read);
        root.model_scope = Some(vec![Uuid::new_v4()]);
        let input = PermissionInput {
            user: &root,
            model: &public,
            memberships: &[],
            granted: None,
        };
        assert_eq!(evaluate_permission(&input), None);
        assert!(!root.can_create());
        assert!(user(false).can_create());
    }
}
