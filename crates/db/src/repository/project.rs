//! Project repository
//!
//! Creating a project seeds its default roles and enrolls the creator as a
//! member holding the `Manager` role.

use super::role::{MANAGER_ROLE, RoleRepository};
use super::{record, unique_id, validation};
use crate::error::{DbError, DbResult};
use crate::models::Project;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use tracing::debug;

/// Repository for project CRUD operations
pub struct ProjectRepository<'a> {
    client: &'a Surreal<Db>,
}

/// Partial update for a project
#[derive(Debug, Default)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    /// `Some(None)` clears the description
    pub description: Option<Option<String>>,
}

impl ProjectUpdate {
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

impl<'a> ProjectRepository<'a> {
    pub fn new(client: &'a Surreal<Db>) -> Self {
        Self { client }
    }

    /// Create a project in a workspace.
    ///
    /// Seeds the default roles and adds the creator as a member with the
    /// `Manager` role.
    ///
    /// # Errors
    ///
    /// Returns `DbError::NotFound` if the workspace doesn't exist.
    pub async fn create(
        &self,
        workspace_id: &str,
        name: &str,
        description: Option<&str>,
        creator_id: &str,
    ) -> DbResult<Project> {
        let name = validation::name("name", name)?;
        let description = validation::description(description)?;

        if !super::record_exists(self.client, "workspace", workspace_id).await? {
            return Err(DbError::not_found("Workspace", workspace_id));
        }

        let id = unique_id(self.client, "project", &name).await?;
        let roles = RoleRepository::new(self.client).seed_defaults(&id).await?;
        let manager_id = roles
            .iter()
            .find(|role| role.name == MANAGER_ROLE)
            .map(|role| role.id.clone());
        debug!("Creating project: {} in workspace {}", id, workspace_id);

        let mut statements = vec![
            "BEGIN TRANSACTION;".to_string(),
            r#"CREATE $record SET
                workspace_id = $workspace_id,
                name = $name,
                description = $description,
                creator_id = $creator_id;"#
                .to_string(),
        ];
        for index in 0..roles.len() {
            statements.push(format!(
                "CREATE $role_{index} SET project_id = $id, name = $role_name_{index}, \
                 permissions = $role_permissions_{index};"
            ));
        }
        statements.push("RELATE $creator->works_on->$record SET role_id = $manager_id;".to_string());
        statements.push("COMMIT TRANSACTION;".to_string());

        let mut query = self
            .client
            .query(statements.join("\n"))
            .bind(("record", record("project", &id)))
            .bind(("id", id.clone()))
            .bind(("creator", record("user", creator_id)))
            .bind(("workspace_id", workspace_id.to_string()))
            .bind(("name", name))
            .bind(("description", description))
            .bind(("creator_id", creator_id.to_string()))
            .bind(("manager_id", manager_id));
        for (index, role) in roles.into_iter().enumerate() {
            query = query
                .bind((format!("role_{index}"), record("project_role", &role.id)))
                .bind((format!("role_name_{index}"), role.name))
                .bind((format!("role_permissions_{index}"), role.permissions));
        }
        query.await?.check()?;

        self.require(&id).await
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Project>> {
        debug!("Fetching project: {}", id);
        let project: Option<Project> = self
            .client
            .select(("project", id))
            .await
            .map_err(|e| DbError::Query(Box::new(e)))?;
        Ok(project)
    }

    pub async fn require(&self, id: &str) -> DbResult<Project> {
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Project", id))
    }

    /// Projects in a workspace, oldest first.
    pub async fn list_for_workspace(&self, workspace_id: &str) -> DbResult<Vec<Project>> {
        let mut response = self
            .client
            .query("SELECT * FROM project WHERE workspace_id = $workspace_id ORDER BY created_at ASC")
            .bind(("workspace_id", workspace_id.to_string()))
            .await?;
        let projects: Vec<Project> = response.take(0)?;
        Ok(projects)
    }

    pub async fn update(&self, id: &str, updates: &ProjectUpdate) -> DbResult<Project> {
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

        debug!("Updating project: {}", id);
        let query = format!("UPDATE $record SET {}", field_updates.join(", "));
        let mut response = self
            .client
            .query(query)
            .bind(("record", record("project", id)))
            .bind(("name", name))
            .bind(("description", description))
            .await?;

        let project: Option<Project> = response.take(0)?;
        project.ok_or_else(|| DbError::not_found("Project", id))
    }

    /// Delete a project with its tasks, time entries, roles and memberships.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!("Deleting project: {}", id);
        self.client
            .query(
                r#"
                BEGIN TRANSACTION;
                LET $tasks = (SELECT VALUE record::id(id) FROM task WHERE project_id = $id);
                DELETE time_entry WHERE task_id IN $tasks;
                DELETE task WHERE project_id = $id;
                DELETE project_role WHERE project_id = $id;
                DELETE works_on WHERE out = $record;
                DELETE $record;
                COMMIT TRANSACTION;
            "#,
            )
            .bind(("record", record("project", id)))
            .bind(("id", id.to_string()))
            .await?
            .check()?;
        Ok(())
    }
}
