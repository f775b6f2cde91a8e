//! Project-role guard
//!
//! A caller relates to a project as its `creator`, as a `member` (holding a
//! `works_on` edge), or not at all. The creator relation lapses when the
//! creator leaves the enclosing workspace.

use super::{Decision, DenyReason};
use crate::error::ApiError;
use serde::Serialize;
use tasktrack_db::{Database, Project, ProjectMember, validate_id};
use tracing::debug;

/// How a caller relates to a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectRelation {
    Creator,
    Member,
}

impl ProjectRelation {
    /// The caller's relation to `project`, given their membership row and
    /// whether they still belong to the project's workspace.
    pub fn of(
        project: &Project,
        user_id: &str,
        in_workspace: bool,
        membership: Option<&ProjectMember>,
    ) -> Option<Self> {
        if project.creator_id == user_id && in_workspace {
            Some(ProjectRelation::Creator)
        } else if membership.is_some() {
            Some(ProjectRelation::Member)
        } else {
            None
        }
    }
}

/// A caller admitted to a project
#[derive(Debug, Clone)]
pub struct ProjectAccess {
    pub project: Project,
    pub relation: ProjectRelation,
}

pub fn decide(
    relation: Option<ProjectRelation>,
    allowed: &[ProjectRelation],
) -> Decision<ProjectRelation> {
    match relation {
        None => Decision::Deny(DenyReason::NotMember),
        Some(relation) if allowed.contains(&relation) => Decision::Allow(relation),
        Some(_) => Decision::Deny(DenyReason::RelationNotAllowed),
    }
}

/// Load the project and admit the caller if their relation is in `allowed`.
pub async fn require_project_relation(
    db: &Database,
    user_id: &str,
    project_id: &str,
    allowed: &[ProjectRelation],
) -> Result<ProjectAccess, ApiError> {
    validate_id(project_id)?;
    let project = db.projects().require(project_id).await?;
    let memberships = db.memberships();
    let in_workspace = memberships
        .workspace_role(user_id, &project.workspace_id)
        .await?
        .is_some();
    let membership = memberships.project_membership(user_id, project_id).await?;
    let relation = ProjectRelation::of(&project, user_id, in_workspace, membership.as_ref());

    match decide(relation, allowed).into_result() {
        Ok(relation) => Ok(ProjectAccess { project, relation }),
        Err(reason) => {
            debug!(user_id, project_id, %reason, "project access denied");
            Err(ApiError::forbidden(reason))
        }
    }
}
