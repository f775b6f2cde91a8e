//! Membership repository for workspace and project relations
//!
//! Manages the two membership edges in Tasktrack:
//! - `member_of`: user -> workspace, carrying a `MemberRole`
//! - `works_on`: user -> project, carrying an optional project role id

use super::{conflict_or_query, record};
use crate::error::{DbError, DbResult};
use crate::models::{MemberRole, ProjectMember, WorkspaceMember};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use tracing::debug;

/// Repository for membership (edge) operations
pub struct MembershipRepository<'a> {
    client: &'a Surreal<Db>,
}

const WORKSPACE_MEMBER_FIELDS: &str = "record::id(in) AS user_id, record::id(out) AS workspace_id, \
     in.name AS name, in.email AS email, role, joined_at";

const PROJECT_MEMBER_FIELDS: &str = "record::id(in) AS user_id, record::id(out) AS project_id, \
     in.name AS name, in.email AS email, role_id, joined_at";

impl<'a> MembershipRepository<'a> {
    pub fn new(client: &'a Surreal<Db>) -> Self {
        Self { client }
    }

    // ========================================
    // member_of (workspace) methods
    // ========================================

    /// Add a user to a workspace with the given role.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Conflict` if the user is already a member.
    pub async fn add_workspace_member(
        &self,
        user_id: &str,
        workspace_id: &str,
        role: MemberRole,
    ) -> DbResult<WorkspaceMember> {
        if self.workspace_role(user_id, workspace_id).await?.is_some() {
            return Err(DbError::conflict(format!(
                "user '{}' is already a member of workspace '{}'",
                user_id, workspace_id
            )));
        }

        debug!("Adding {} to workspace {} as {}", user_id, workspace_id, role);
        self.client
            .query("RELATE $user->member_of->$workspace SET role = $role")
            .bind(("user", record("user", user_id)))
            .bind(("workspace", record("workspace", workspace_id)))
            .bind(("role", role.as_str()))
            .await
            .and_then(|response| response.check())
            .map_err(|e| {
                conflict_or_query(e, || {
                    format!(
                        "user '{}' is already a member of workspace '{}'",
                        user_id, workspace_id
                    )
                })
            })?;

        self.workspace_member(user_id, workspace_id)
            .await?
            .ok_or_else(|| DbError::not_found("Workspace member", user_id))
    }

    /// The user's membership in a workspace, if any.
    pub async fn workspace_member(
        &self,
        user_id: &str,
        workspace_id: &str,
    ) -> DbResult<Option<WorkspaceMember>> {
        let query = format!(
            "SELECT {} FROM member_of WHERE in = $user AND out = $workspace LIMIT 1",
            WORKSPACE_MEMBER_FIELDS
        );
        let mut response = self
            .client
            .query(query)
            .bind(("user", record("user", user_id)))
            .bind(("workspace", record("workspace", workspace_id)))
            .await?;
        let rows: Vec<WorkspaceMember> = response.take(0)?;
        Ok(rows.into_iter().next())
    }

    /// The user's role in a workspace, or `None` when not a member.
    pub async fn workspace_role(
        &self,
        user_id: &str,
        workspace_id: &str,
    ) -> DbResult<Option<MemberRole>> {
        Ok(self
            .workspace_member(user_id, workspace_id)
            .await?
            .map(|member| member.role))
    }

    /// All members of a workspace in join order.
    pub async fn list_workspace_members(&self, workspace_id: &str) -> DbResult<Vec<WorkspaceMember>> {
        let query = format!(
            "SELECT {} FROM member_of WHERE out = $workspace ORDER BY joined_at ASC",
            WORKSPACE_MEMBER_FIELDS
        );
        let mut response = self
            .client
            .query(query)
            .bind(("workspace", record("workspace", workspace_id)))
            .await?;
        let rows: Vec<WorkspaceMember> = response.take(0)?;
        Ok(rows)
    }

    /// Change a member's workspace role.
    pub async fn set_workspace_role(
        &self,
        user_id: &str,
        workspace_id: &str,
        role: MemberRole,
    ) -> DbResult<WorkspaceMember> {
        debug!("Setting {} role in workspace {} to {}", user_id, workspace_id, role);
        self.client
            .query("UPDATE member_of SET role = $role WHERE in = $user AND out = $workspace")
            .bind(("user", record("user", user_id)))
            .bind(("workspace", record("workspace", workspace_id)))
            .bind(("role", role.as_str()))
            .await?
            .check()?;

        self.workspace_member(user_id, workspace_id)
            .await?
            .ok_or_else(|| DbError::not_found("Workspace member", user_id))
    }

    /// Remove a user from a workspace.
    ///
    /// Also removes the user from every project in the workspace, unassigns
    /// them from its tasks and discards their running timers there.
    pub async fn remove_workspace_member(&self, user_id: &str, workspace_id: &str) -> DbResult<()> {
        debug!("Removing {} from workspace {}", user_id, workspace_id);
        self.client
            .query(
                r#"
                BEGIN TRANSACTION;
                LET $projects = (SELECT VALUE record::id(id) FROM project WHERE workspace_id = $workspace_id);
                LET $tasks = (SELECT VALUE record::id(id) FROM task WHERE project_id IN $projects);
                DELETE works_on WHERE in = $user AND record::id(out) IN $projects;
                UPDATE task SET assignee_id = NONE WHERE project_id IN $projects AND assignee_id = $user_id;
                DELETE time_entry WHERE user_id = $user_id AND task_id IN $tasks AND ended_at = NONE;
                DELETE member_of WHERE in = $user AND out = $workspace;
                COMMIT TRANSACTION;
            "#,
            )
            .bind(("user", record("user", user_id)))
            .bind(("workspace", record("workspace", workspace_id)))
            .bind(("user_id", user_id.to_string()))
            .bind(("workspace_id", workspace_id.to_string()))
            .await?
            .check()?;
        Ok(())
    }

    // ========================================
    // works_on (project) methods
    // ========================================

    /// Add a user to a project, optionally with a project role.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Conflict` if the user is already a project member.
    pub async fn add_project_member(
        &self,
        user_id: &str,
        project_id: &str,
        role_id: Option<&str>,
    ) -> DbResult<ProjectMember> {
        if self.project_membership(user_id, project_id).await?.is_some() {
            return Err(DbError::conflict(format!(
                "user '{}' is already a member of project '{}'",
                user_id, project_id
            )));
        }

        debug!("Adding {} to project {} with role {:?}", user_id, project_id, role_id);
        self.client
            .query("RELATE $user->works_on->$project SET role_id = $role_id")
            .bind(("user", record("user", user_id)))
            .bind(("project", record("project", project_id)))
            .bind(("role_id", role_id.map(str::to_string)))
            .await
            .and_then(|response| response.check())
            .map_err(|e| {
                conflict_or_query(e, || {
                    format!(
                        "user '{}' is already a member of project '{}'",
                        user_id, project_id
                    )
                })
            })?;

        self.project_membership(user_id, project_id)
            .await?
            .ok_or_else(|| DbError::not_found("Project member", user_id))
    }

    /// The user's membership in a project, if any.
    pub async fn project_membership(
        &self,
        user_id: &str,
        project_id: &str,
    ) -> DbResult<Option<ProjectMember>> {
        let query = format!(
            "SELECT {} FROM works_on WHERE in = $user AND out = $project LIMIT 1",
            PROJECT_MEMBER_FIELDS
        );
        let mut response = self
            .client
            .query(query)
            .bind(("user", record("user", user_id)))
            .bind(("project", record("project", project_id)))
            .await?;
        let rows: Vec<ProjectMember> = response.take(0)?;
        Ok(rows.into_iter().next())
    }

    /// All members of a project in join order.
    pub async fn list_project_members(&self, project_id: &str) -> DbResult<Vec<ProjectMember>> {
        let query = format!(
            "SELECT {} FROM works_on WHERE out = $project ORDER BY joined_at ASC",
            PROJECT_MEMBER_FIELDS
        );
        let mut response = self
            .client
            .query(query)
            .bind(("project", record("project", project_id)))
            .await?;
        let rows: Vec<ProjectMember> = response.take(0)?;
        Ok(rows)
    }

    /// Assign (or clear, with `None`) a member's project role.
    pub async fn set_project_role(
        &self,
        user_id: &str,
        project_id: &str,
        role_id: Option<&str>,
    ) -> DbResult<ProjectMember> {
        debug!("Setting {} role in project {} to {:?}", user_id, project_id, role_id);
        self.client
            .query("UPDATE works_on SET role_id = $role_id WHERE in = $user AND out = $project")
            .bind(("user", record("user", user_id)))
            .bind(("project", record("project", project_id)))
            .bind(("role_id", role_id.map(str::to_string)))
            .await?
            .check()?;

        self.project_membership(user_id, project_id)
            .await?
            .ok_or_else(|| DbError::not_found("Project member", user_id))
    }

    /// Remove a user from a project.
    ///
    /// Unassigns their tasks there and discards their running timer on them.
    pub async fn remove_project_member(&self, user_id: &str, project_id: &str) -> DbResult<()> {
        debug!("Removing {} from project {}", user_id, project_id);
        self.client
            .query(
                r#"
                BEGIN TRANSACTION;
                LET $tasks = (SELECT VALUE record::id(id) FROM task WHERE project_id = $project_id);
                UPDATE task SET assignee_id = NONE WHERE project_id = $project_id AND assignee_id = $user_id;
                DELETE time_entry WHERE user_id = $user_id AND task_id IN $tasks AND ended_at = NONE;
                DELETE works_on WHERE in = $user AND out = $project;
                COMMIT TRANSACTION;
            "#,
            )
            .bind(("user", record("user", user_id)))
            .bind(("project", record("project", project_id)))
            .bind(("user_id", user_id.to_string()))
            .bind(("project_id", project_id.to_string()))
            .await?
            .check()?;
        Ok(())
    }

    /// Unassign a role from every member holding it.
    pub async fn clear_role(&self, role_id: &str) -> DbResult<()> {
        self.client
            .query("UPDATE works_on SET role_id = NONE WHERE role_id = $role_id")
            .bind(("role_id", role_id.to_string()))
            .await?
            .check()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{NewTask, TaskRepository, TimeEntryRepository};
    use crate::test_utils::{create_group_workspace, create_project, create_test_db, create_user};

    #[tokio::test]
    async fn test_add_and_list_workspace_members() {
        let db = create_test_db().await.unwrap();
        let owner = create_user(&db, "owner@example.com", "Owner").await;
        let bob = create_user(&db, "bob@example.com", "Bob").await;
        let ws = create_group_workspace(&db, &owner, "Acme").await;
        let repo = MembershipRepository::new(&db);

        let member = repo
            .add_workspace_member(&bob.id, &ws.id, MemberRole::Member)
            .await
            .unwrap();
        assert_eq!(member.user_id, bob.id);
        assert_eq!(member.workspace_id, ws.id);
        assert_eq!(member.email, "bob@example.com");
        assert_eq!(member.role, MemberRole::Member);

        let members = repo.list_workspace_members(&ws.id).await.unwrap();
        let roles: Vec<(String, MemberRole)> =
            members.into_iter().map(|m| (m.user_id, m.role)).collect();
        assert_eq!(
            roles,
            vec![(owner.id, MemberRole::Owner), (bob.id, MemberRole::Member)]
        );
    }

    #[tokio::test]
    async fn test_add_workspace_member_twice_conflicts() {
        let db = create_test_db().await.unwrap();
        let owner = create_user(&db, "owner@example.com", "Owner").await;
        let ws = create_group_workspace(&db, &owner, "Acme").await;
        let repo = MembershipRepository::new(&db);

        let err = repo
            .add_workspace_member(&owner.id, &ws.id, MemberRole::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_workspace_role_for_non_member_is_none() {
        let db = create_test_db().await.unwrap();
        let owner = create_user(&db, "owner@example.com", "Owner").await;
        let stranger = create_user(&db, "x@example.com", "X").await;
        let ws = create_group_workspace(&db, &owner, "Acme").await;

        let role = MembershipRepository::new(&db)
            .workspace_role(&stranger.id, &ws.id)
            .await
            .unwrap();
        assert_eq!(role, None);
    }

    #[tokio::test]
    async fn test_set_workspace_role() {
        let db = create_test_db().await.unwrap();
        let owner = create_user(&db, "owner@example.com", "Owner").await;
        let bob = create_user(&db, "bob@example.com", "Bob").await;
        let ws = create_group_workspace(&db, &owner, "Acme").await;
        let repo = MembershipRepository::new(&db);
        repo.add_workspace_member(&bob.id, &ws.id, MemberRole::Member)
            .await
            .unwrap();

        let updated = repo
            .set_workspace_role(&bob.id, &ws.id, MemberRole::Admin)
            .await
            .unwrap();
        assert_eq!(updated.role, MemberRole::Admin);
    }

    #[tokio::test]
    async fn test_remove_workspace_member_drops_project_memberships() {
        let db = create_test_db().await.unwrap();
        let owner = create_user(&db, "owner@example.com", "Owner").await;
        let bob = create_user(&db, "bob@example.com", "Bob").await;
        let ws = create_group_workspace(&db, &owner, "Acme").await;
        let project = create_project(&db, &ws, &owner, "Launch").await;
        let repo = MembershipRepository::new(&db);
        repo.add_workspace_member(&bob.id, &ws.id, MemberRole::Member)
            .await
            .unwrap();
        repo.add_project_member(&bob.id, &project.id, None)
            .await
            .unwrap();

        repo.remove_workspace_member(&bob.id, &ws.id).await.unwrap();

        assert_eq!(repo.workspace_role(&bob.id, &ws.id).await.unwrap(), None);
        assert!(
            repo.project_membership(&bob.id, &project.id)
                .await
                .unwrap()
                .is_none()
        );
        // The owner's memberships are untouched
        assert!(
            repo.project_membership(&owner.id, &project.id)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_project_membership_lifecycle() {
        let db = create_test_db().await.unwrap();
        let owner = create_user(&db, "owner@example.com", "Owner").await;
        let bob = create_user(&db, "bob@example.com", "Bob").await;
        let ws = create_group_workspace(&db, &owner, "Acme").await;
        let project = create_project(&db, &ws, &owner, "Launch").await;
        let repo = MembershipRepository::new(&db);

        let member = repo
            .add_project_member(&bob.id, &project.id, Some("role1"))
            .await
            .unwrap();
        assert_eq!(member.role_id.as_deref(), Some("role1"));
        assert_eq!(member.name, "Bob");

        let err = repo
            .add_project_member(&bob.id, &project.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict { .. }));

        let cleared = repo
            .set_project_role(&bob.id, &project.id, None)
            .await
            .unwrap();
        assert!(cleared.role_id.is_none());

        repo.remove_project_member(&bob.id, &project.id)
            .await
            .unwrap();
        assert!(
            repo.project_membership(&bob.id, &project.id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_concurrent_adds_to_project() {
        let db = create_test_db().await.unwrap();
        let owner = create_user(&db, "owner@example.com", "Owner").await;
        let bob = create_user(&db, "bob@example.com", "Bob").await;
        let ws = create_group_workspace(&db, &owner, "Acme").await;
        let project = create_project(&db, &ws, &owner, "Launch").await;
        let repo = MembershipRepository::new(&db);

        let (first, second) = tokio::join!(
            repo.add_project_member(&bob.id, &project.id, None),
            repo.add_project_member(&bob.id, &project.id, None),
        );

        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(DbError::Conflict { .. })))
        );
        assert_eq!(repo.list_project_members(&project.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_remove_project_member_discards_running_timer() {
        let db = create_test_db().await.unwrap();
        let owner = create_user(&db, "owner@example.com", "Owner").await;
        let bob = create_user(&db, "bob@example.com", "Bob").await;
        let ws = create_group_workspace(&db, &owner, "Acme").await;
        let project = create_project(&db, &ws, &owner, "Launch").await;
        let other = create_project(&db, &ws, &owner, "Other").await;
        let repo = MembershipRepository::new(&db);
        repo.add_project_member(&bob.id, &project.id, None)
            .await
            .unwrap();

        let tasks = TaskRepository::new(&db);
        let task = tasks
            .create(&project.id, &owner.id, &NewTask::titled("Focus"))
            .await
            .unwrap();
        let elsewhere = tasks
            .create(&other.id, &owner.id, &NewTask::titled("Elsewhere"))
            .await
            .unwrap();

        let timers = TimeEntryRepository::new(&db);
        timers.start(&task.id, &bob.id, false).await.unwrap();
        timers.start(&elsewhere.id, &owner.id, false).await.unwrap();

        repo.remove_project_member(&bob.id, &project.id)
            .await
            .unwrap();

        assert!(timers.running_for(&bob.id).await.unwrap().is_none());
        assert!(timers.running_for(&owner.id).await.unwrap().is_some());
        // The discarded timer no longer blocks a new one
        timers.start(&elsewhere.id, &bob.id, false).await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_role_unassigns_members() {
        let db = create_test_db().await.unwrap();
        let owner = create_user(&db, "owner@example.com", "Owner").await;
        let bob = create_user(&db, "bob@example.com", "Bob").await;
        let ws = create_group_workspace(&db, &owner, "Acme").await;
        let project = create_project(&db, &ws, &owner, "Launch").await;
        let repo = MembershipRepository::new(&db);
        repo.add_project_member(&bob.id, &project.id, Some("gone"))
            .await
            .unwrap();

        repo.clear_role("gone").await.unwrap();

        let member = repo
            .project_membership(&bob.id, &project.id)
            .await
            .unwrap()
            .unwrap();
        assert!(member.role_id.is_none());
    }
}
