//! Workspace-role guard

use super::{Decision, DenyReason};
use crate::error::ApiError;
use tasktrack_db::{Database, MemberRole, Workspace, validate_id};
use tracing::debug;

/// A caller admitted to a workspace
#[derive(Debug, Clone)]
pub struct WorkspaceAccess {
    pub workspace: Workspace,
    pub role: MemberRole,
}

/// Decide whether a caller holding `role` may use a route open to `allowed`.
pub fn decide(role: Option<MemberRole>, allowed: &[MemberRole]) -> Decision<MemberRole> {
    match role {
        None => Decision::Deny(DenyReason::NotMember),
        Some(role) if allowed.contains(&role) => Decision::Allow(role),
        Some(_) => Decision::Deny(DenyReason::RoleNotAllowed),
    }
}

/// Load the workspace and admit the caller if their role is in `allowed`.
///
/// # Errors
///
/// `NotFound` when the workspace doesn't exist, `Forbidden` when the
/// caller is not a member or holds a role outside `allowed`.
pub async fn require_workspace_role(
    db: &Database,
    user_id: &str,
    workspace_id: &str,
    allowed: &[MemberRole],
) -> Result<WorkspaceAccess, ApiError> {
    validate_id(workspace_id)?;
    let workspace = db.workspaces().require(workspace_id).await?;
    let role = db.memberships().workspace_role(user_id, workspace_id).await?;

    match decide(role, allowed).into_result() {
        Ok(role) => Ok(WorkspaceAccess { workspace, role }),
        Err(reason) => {
            debug!(user_id, workspace_id, %reason, "workspace access denied");
            Err(ApiError::forbidden(reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use MemberRole::{Admin, Member, Owner};

    #[test]
    fn test_non_member_is_denied() {
        assert_eq!(
            decide(None, &[Owner, Admin, Member]),
            Decision::Deny(DenyReason::NotMember)
        );
    }

    #[test]
    fn test_role_in_set_is_allowed() {
        assert_eq!(decide(Some(Admin), &[Owner, Admin]), Decision::Allow(Admin));
        assert_eq!(decide(Some(Owner), &[Owner]), Decision::Allow(Owner));
    }

    #[test]
    fn test_role_outside_set_is_denied() {
        assert_eq!(
            decide(Some(Member), &[Owner, Admin]),
            Decision::Deny(DenyReason::RoleNotAllowed)
        );
        assert_eq!(
            decide(Some(Admin), &[Owner]),
            Decision::Deny(DenyReason::RoleNotAllowed)
        );
    }

    #[test]
    fn test_empty_set_denies_everyone() {
        for role in MemberRole::ALL {
            assert!(!decide(Some(*role), &[]).is_allowed());
        }
    }
}
