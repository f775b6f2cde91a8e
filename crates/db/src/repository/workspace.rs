//! Workspace repository
//!
//! Workspaces are created together with their owner's `member_of` edge and
//! deleted together with every project, task, role and membership they hold.

use super::{record, unique_id, validation};
use crate::error::{DbError, DbResult};
use crate::models::{MemberRole, Workspace, WorkspaceKind};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use tracing::{debug, trace};

/// Name given to the workspace created at registration
pub const PERSONAL_WORKSPACE_NAME: &str = "Personal";

/// Repository for workspace CRUD operations
pub struct WorkspaceRepository<'a> {
    client: &'a Surreal<Db>,
}

/// Partial update for a workspace
#[derive(Debug, Default)]
pub struct WorkspaceUpdate {
    pub name: Option<String>,
    /// `Some(None)` clears the description
    pub description: Option<Option<String>>,
}

impl WorkspaceUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    pub fn has_updates(&self) -> bool {
        self.name.is_some() || self.description.is_some()
    }
}

impl<'a> WorkspaceRepository<'a> {
    pub fn new(client: &'a Surreal<Db>) -> Self {
        Self { client }
    }

    /// Create a workspace owned by `owner_id`.
    ///
    /// The owner is recorded on the workspace and as a `member_of` edge with
    /// role `owner`, in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `DbError::NotFound` if the owner doesn't exist.
    /// Returns `DbError::Conflict` when creating a second personal workspace.
    pub async fn create(
        &self,
        name: &str,
        description: Option<&str>,
        kind: WorkspaceKind,
        owner_id: &str,
    ) -> DbResult<Workspace> {
        let name = validation::name("name", name)?;
        let description = validation::description(description)?;

        if !super::record_exists(self.client, "user", owner_id).await? {
            return Err(DbError::not_found("User", owner_id));
        }
        if kind == WorkspaceKind::Personal && self.personal_for(owner_id).await?.is_some() {
            return Err(DbError::conflict(format!(
                "user '{}' already has a personal workspace",
                owner_id
            )));
        }

        let id = unique_id(self.client, "workspace", &name).await?;
        debug!("Creating {} workspace: {} owned by {}", kind, id, owner_id);

        self.client
            .query(
                r#"
                BEGIN TRANSACTION;
                CREATE $record SET
                    name = $name,
                    description = $description,
                    kind = $kind,
                    owner_id = $owner_id;
                RELATE $owner->member_of->$record SET role = $role;
                COMMIT TRANSACTION;
            "#,
            )
            .bind(("record", record("workspace", &id)))
            .bind(("owner", record("user", owner_id)))
            .bind(("name", name))
            .bind(("description", description))
            .bind(("kind", kind.as_str()))
            .bind(("owner_id", owner_id.to_string()))
            .bind(("role", MemberRole::Owner.as_str()))
            .await?
            .check()?;

        self.require(&id).await
    }

    /// Create the personal workspace for a freshly registered user.
    pub async fn create_personal(&self, owner_id: &str) -> DbResult<Workspace> {
        self.create(
            PERSONAL_WORKSPACE_NAME,
            None,
            WorkspaceKind::Personal,
            owner_id,
        )
        .await
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Workspace>> {
        debug!("Fetching workspace: {}", id);
        let workspace: Option<Workspace> = self
            .client
            .select(("workspace", id))
            .await
            .map_err(|e| DbError::Query(Box::new(e)))?;
        Ok(workspace)
    }

    pub async fn require(&self, id: &str) -> DbResult<Workspace> {
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Workspace", id))
    }

    /// All workspaces the user is a member of, oldest first.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<Workspace>> {
        let mut response = self
            .client
            .query(
                r#"SELECT * FROM workspace
                   WHERE id IN (SELECT VALUE out FROM member_of WHERE in = $user)
                   ORDER BY created_at ASC"#,
            )
            .bind(("user", record("user", user_id)))
            .await?;
        let workspaces: Vec<Workspace> = response.take(0)?;
        trace!("User {} belongs to {} workspaces", user_id, workspaces.len());
        Ok(workspaces)
    }

    /// The user's personal workspace, if it exists.
    pub async fn personal_for(&self, user_id: &str) -> DbResult<Option<Workspace>> {
        let mut response = self
            .client
            .query("SELECT * FROM workspace WHERE owner_id = $owner AND kind = 'personal' LIMIT 1")
            .bind(("owner", user_id.to_string()))
            .await?;
        let workspaces: Vec<Workspace> = response.take(0)?;
        Ok(workspaces.into_iter().next())
    }

    /// Group workspaces owned by the user.
    pub async fn owned_groups(&self, user_id: &str) -> DbResult<Vec<Workspace>> {
        let mut response = self
            .client
            .query("SELECT * FROM workspace WHERE owner_id = $owner AND kind = 'group'")
            .bind(("owner", user_id.to_string()))
            .await?;
        let workspaces: Vec<Workspace> = response.take(0)?;
        Ok(workspaces)
    }

    pub async fn update(&self, id: &str, updates: &WorkspaceUpdate) -> DbResult<Workspace> {
        if !updates.has_updates() {
            return self.require(id).await;
        }

        let mut field_updates = Vec::new();
        let name = match &updates.name {
            Some(name) => {
                field_updates.push("name = $name");
                Some(validation::name("name", name)?)
            }
            None => None,
        };
        let description = match &updates.description {
            Some(description) => {
                field_updates.push("description = $description");
                validation::description(description.as_deref())?
            }
            None => None,
        };
        field_updates.push("updated_at = time::now()");

        debug!("Updating workspace: {}", id);
        let query = format!("UPDATE $record SET {}", field_updates.join(", "));
        let mut response = self
            .client
            .query(query)
            .bind(("record", record("workspace", id)))
            .bind(("name", name))
            .bind(("description", description))
            .await?;

        let workspace: Option<Workspace> = response.take(0)?;
        workspace.ok_or_else(|| DbError::not_found("Workspace", id))
    }

    /// Delete a workspace and everything inside it.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!("Deleting workspace: {}", id);
        self.client
            .query(
                r#"
                BEGIN TRANSACTION;
                LET $projects = (SELECT VALUE record::id(id) FROM project WHERE workspace_id = $id);
                LET $tasks = (SELECT VALUE record::id(id) FROM task WHERE project_id IN $projects);
                DELETE time_entry WHERE task_id IN $tasks;
                DELETE task WHERE project_id IN $projects;
                DELETE project_role WHERE project_id IN $projects;
                DELETE works_on WHERE record::id(out) IN $projects;
                DELETE project WHERE workspace_id = $id;
                DELETE member_of WHERE out = $record;
                DELETE $record;
                COMMIT TRANSACTION;
            "#,
            )
            .bind(("record", record("workspace", id)))
            .bind(("id", id.to_string()))
            .await?
            .check()?;
        Ok(())
    }
}
