//! Project-permission guard
//!
//! Order of checks: a caller outside the enclosing workspace is refused.
//! The project creator and the workspace owner always pass. Anyone else
//! needs a `works_on` edge, a role on that edge, and the permission in the
//! role.

use super::{Decision, DenyReason};
use crate::error::ApiError;
use tasktrack_db::{Database, MemberRole, Permission, Project, ProjectRole, validate_id};
use tracing::debug;

/// What admitted a caller past the permission guard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionGrant {
    Creator,
    WorkspaceOwner,
    /// Granted by the project role with this id
    Role(String),
}

/// Membership facts the decision is made from
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionFacts<'a> {
    pub is_workspace_member: bool,
    pub is_creator: bool,
    pub is_workspace_owner: bool,
    pub is_member: bool,
    pub role: Option<&'a ProjectRole>,
}

/// A caller admitted to a permission-guarded project route
#[derive(Debug, Clone)]
pub struct PermissionAccess {
    pub project: Project,
    pub grant: PermissionGrant,
}

pub fn decide(facts: PermissionFacts<'_>, required: Permission) -> Decision<PermissionGrant> {
    if !facts.is_workspace_member {
        return Decision::Deny(DenyReason::NotMember);
    }
    if facts.is_creator {
        return Decision::Allow(PermissionGrant::Creator);
    }
    if facts.is_workspace_owner {
        return Decision::Allow(PermissionGrant::WorkspaceOwner);
    }
    if !facts.is_member {
        return Decision::Deny(DenyReason::NotMember);
    }
    match facts.role {
        None => Decision::Deny(DenyReason::NoRoleAssigned),
        Some(role) if role.grants(required) => Decision::Allow(PermissionGrant::Role(role.id.clone())),
        Some(_) => Decision::Deny(DenyReason::MissingPermission),
    }
}

/// Load the project and admit the caller if they hold `required`.
pub async fn require_permission(
    db: &Database,
    user_id: &str,
    project_id: &str,
    required: Permission,
) -> Result<PermissionAccess, ApiError> {
    validate_id(project_id)?;
    let project = db.projects().require(project_id).await?;

    let memberships = db.memberships();
    let workspace_role = memberships
        .workspace_role(user_id, &project.workspace_id)
        .await?;
    let membership = memberships.project_membership(user_id, project_id).await?;
    let role = match membership.as_ref().and_then(|m| m.role_id.as_deref()) {
        Some(role_id) => db
            .roles()
            .get(role_id)
            .await?
            .filter(|role| role.project_id == project.id),
        None => None,
    };

    let facts = PermissionFacts {
        is_workspace_member: workspace_role.is_some(),
        is_creator: project.creator_id == user_id,
        is_workspace_owner: workspace_role == Some(MemberRole::Owner),
        is_member: membership.is_some(),
        role: role.as_ref(),
    };

    match decide(facts, required).into_result() {
        Ok(grant) => Ok(PermissionAccess { project, grant }),
        Err(reason) => {
            debug!(user_id, project_id, permission = %required, %reason, "permission denied");
            Err(ApiError::forbidden(reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn role(permissions: Vec<Permission>) -> ProjectRole {
        ProjectRole {
            id: "r1".to_string(),
            project_id: "p1".to_string(),
            name: "Contributor".to_string(),
            permissions,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_creator_always_allowed() {
        let facts = PermissionFacts {
            is_workspace_member: true,
            is_creator: true,
            ..Default::default()
        };
        assert_eq!(
            decide(facts, Permission::RoleManage),
            Decision::Allow(PermissionGrant::Creator)
        );
    }

    #[test]
    fn test_workspace_owner_bypasses_project_roles() {
        let facts = PermissionFacts {
            is_workspace_member: true,
            is_workspace_owner: true,
            ..Default::default()
        };
        assert_eq!(
            decide(facts, Permission::TaskDelete),
            Decision::Allow(PermissionGrant::WorkspaceOwner)
        );
    }

    #[test]
    fn test_creator_outside_workspace_is_not_member() {
        let facts = PermissionFacts {
            is_creator: true,
            ..Default::default()
        };
        assert_eq!(
            decide(facts, Permission::ProjectUpdate),
            Decision::Deny(DenyReason::NotMember)
        );
    }

    #[test]
    fn test_outsider_is_not_member() {
        assert_eq!(
            decide(PermissionFacts::default(), Permission::TaskCreate),
            Decision::Deny(DenyReason::NotMember)
        );
    }

    #[test]
    fn test_member_without_role() {
        let facts = PermissionFacts {
            is_workspace_member: true,
            is_member: true,
            ..Default::default()
        };
        assert_eq!(
            decide(facts, Permission::TaskCreate),
            Decision::Deny(DenyReason::NoRoleAssigned)
        );
    }

    #[test]
    fn test_member_role_grants_or_denies() {
        let contributor = role(vec![Permission::TaskCreate, Permission::TimeTrack]);
        let facts = PermissionFacts {
            is_workspace_member: true,
            is_member: true,
            role: Some(&contributor),
            ..Default::default()
        };

        assert_eq!(
            decide(facts, Permission::TimeTrack),
            Decision::Allow(PermissionGrant::Role("r1".to_string()))
        );
        assert_eq!(
            decide(facts, Permission::TaskDelete),
            Decision::Deny(DenyReason::MissingPermission)
        );
    }
}
