//! Access guards
//!
//! Each guard is split in two: an async lookup that loads the caller's
//! membership facts from the store, and a pure `decide` function that turns
//! those facts plus the route's requirement into a [`Decision`]. Handlers
//! call the `require_*` lookups; tests exercise `decide` directly.

mod permission;
mod project;
mod workspace;

pub use permission::{PermissionAccess, PermissionFacts, PermissionGrant, require_permission};
pub use project::{ProjectAccess, ProjectRelation, require_project_relation};
pub use workspace::{WorkspaceAccess, require_workspace_role};

use serde::Serialize;
use std::fmt;

/// Why a guard refused a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Caller has no membership in the workspace or project
    NotMember,
    /// Caller's workspace role is not in the route's allowed set
    RoleNotAllowed,
    /// Caller's relation to the project is not in the route's allowed set
    RelationNotAllowed,
    /// Caller is a project member without a role
    NoRoleAssigned,
    /// Caller's project role lacks the required permission
    MissingPermission,
    /// Caller does not own the resource
    NotOwner,
}

impl DenyReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DenyReason::NotMember => "not_member",
            DenyReason::RoleNotAllowed => "role_not_allowed",
            DenyReason::RelationNotAllowed => "relation_not_allowed",
            DenyReason::NoRoleAssigned => "no_role_assigned",
            DenyReason::MissingPermission => "missing_permission",
            DenyReason::NotOwner => "not_owner",
        }
    }

    pub const fn message(&self) -> &'static str {
        match self {
            DenyReason::NotMember => "you are not a member of this resource",
            DenyReason::RoleNotAllowed => "your workspace role does not allow this action",
            DenyReason::RelationNotAllowed => "your relation to this project does not allow this action",
            DenyReason::NoRoleAssigned => "you have no role in this project",
            DenyReason::MissingPermission => "your project role lacks the required permission",
            DenyReason::NotOwner => "only the owner can do this",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a guard decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision<G> {
    /// Request may proceed; carries what granted access
    Allow(G),
    Deny(DenyReason),
}

impl<G> Decision<G> {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }

    pub fn into_result(self) -> Result<G, DenyReason> {
        match self {
            Decision::Allow(grant) => Ok(grant),
            Decision::Deny(reason) => Err(reason),
        }
    }
}
