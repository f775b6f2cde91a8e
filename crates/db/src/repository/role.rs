//! Project role repository
//!
//! A project role is a named set of permissions. Every project starts with
//! three roles: `Manager` (everything), `Contributor` (work on tasks and
//! track time) and `Viewer` (read only).

use super::{MembershipRepository, conflict_or_query, record, unique_id, validation};
use crate::error::{DbError, DbResult};
use crate::models::{Permission, ProjectRole};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use tracing::debug;

pub const MANAGER_ROLE: &str = "Manager";
pub const CONTRIBUTOR_ROLE: &str = "Contributor";
pub const VIEWER_ROLE: &str = "Viewer";

/// Roles seeded into every new project
pub fn default_roles() -> Vec<(&'static str, Vec<Permission>)> {
    vec![
        (MANAGER_ROLE, Permission::ALL.to_vec()),
        (
            CONTRIBUTOR_ROLE,
            vec![
                Permission::TaskCreate,
                Permission::TaskUpdate,
                Permission::TimeTrack,
            ],
        ),
        (VIEWER_ROLE, Vec::new()),
    ]
}

/// A default role whose key was chosen before insertion
#[derive(Debug, Clone)]
pub(crate) struct SeedRole {
    pub id: String,
    pub name: &'static str,
    pub permissions: Vec<&'static str>,
}

/// Repository for project role operations
pub struct RoleRepository<'a> {
    client: &'a Surreal<Db>,
}

/// Partial update for a project role
#[derive(Debug, Default)]
pub struct RoleUpdate {
    pub name: Option<String>,
    /// Replaces the whole permission set
    pub permissions: Option<Vec<Permission>>,
}

impl RoleUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_permissions(mut self, permissions: Vec<Permission>) -> Self {
        self.permissions = Some(permissions);
        self
    }

    pub fn has_updates(&self) -> bool {
        self.name.is_some() || self.permissions.is_some()
    }
}

/// Permission names in first-seen order, without duplicates.
fn permission_names(permissions: &[Permission]) -> Vec<&'static str> {
    let mut names = Vec::with_capacity(permissions.len());
    for permission in permissions {
        let name = permission.as_str();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

impl<'a> RoleRepository<'a> {
    pub fn new(client: &'a Surreal<Db>) -> Self {
        Self { client }
    }

    /// Create a role in a project.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Conflict` if the project already has a role with
    /// that name (case-insensitive).
    pub async fn create(
        &self,
        project_id: &str,
        name: &str,
        permissions: &[Permission],
    ) -> DbResult<ProjectRole> {
        let name = validation::role_name(name)?;
        if self.find_by_name(project_id, &name).await?.is_some() {
            return Err(DbError::conflict(format!(
                "project already has a role named '{}'",
                name
            )));
        }

        let id = unique_id(self.client, "project_role", &format!("{project_id}/{name}")).await?;
        debug!("Creating role: {} ({}) in project {}", id, name, project_id);

        self.client
            .query("CREATE $record SET project_id = $project_id, name = $name, permissions = $permissions")
            .bind(("record", record("project_role", &id)))
            .bind(("project_id", project_id.to_string()))
            .bind(("name", name.clone()))
            .bind(("permissions", permission_names(permissions)))
            .await
            .and_then(|response| response.check())
            .map_err(|e| {
                conflict_or_query(e, || format!("project already has a role named '{}'", name))
            })?;

        self.require(&id).await
    }

    /// Pick keys for the default roles of a project that is about to be
    /// created. Nothing is written.
    pub(crate) async fn seed_defaults(&self, project_id: &str) -> DbResult<Vec<SeedRole>> {
        let mut roles = Vec::new();
        for (name, permissions) in default_roles() {
            let id =
                unique_id(self.client, "project_role", &format!("{project_id}/{name}")).await?;
            roles.push(SeedRole {
                id,
                name,
                permissions: permission_names(&permissions),
            });
        }
        Ok(roles)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<ProjectRole>> {
        let role: Option<ProjectRole> = self
            .client
            .select(("project_role", id))
            .await
            .map_err(|e| DbError::Query(Box::new(e)))?;
        Ok(role)
    }

    pub async fn require(&self, id: &str) -> DbResult<ProjectRole> {
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Role", id))
    }

    /// Fetch a role that must belong to `project_id`.
    ///
    /// A role from another project is reported as not found.
    pub async fn require_in_project(&self, project_id: &str, id: &str) -> DbResult<ProjectRole> {
        match self.get(id).await? {
            Some(role) if role.project_id == project_id => Ok(role),
            _ => Err(DbError::not_found("Role", id)),
        }
    }

    /// Roles of a project, oldest first.
    pub async fn list_for_project(&self, project_id: &str) -> DbResult<Vec<ProjectRole>> {
        let mut response = self
            .client
            .query("SELECT * FROM project_role WHERE project_id = $project_id ORDER BY created_at ASC")
            .bind(("project_id", project_id.to_string()))
            .await?;
        let roles: Vec<ProjectRole> = response.take(0)?;
        Ok(roles)
    }

    /// Find a project's role by name (case-insensitive).
    pub async fn find_by_name(&self, project_id: &str, name: &str) -> DbResult<Option<ProjectRole>> {
        let mut response = self
            .client
            .query(
                "SELECT * FROM project_role WHERE project_id = $project_id \
                 AND string::lowercase(name) = $name LIMIT 1",
            )
            .bind(("project_id", project_id.to_string()))
            .bind(("name", name.trim().to_lowercase()))
            .await?;
        let roles: Vec<ProjectRole> = response.take(0)?;
        Ok(roles.into_iter().next())
    }

    pub async fn update(&self, id: &str, updates: &RoleUpdate) -> DbResult<ProjectRole> {
        let current = self.require(id).await?;
        if !updates.has_updates() {
            return Ok(current);
        }

        let mut field_updates = Vec::new();
        let name = match &updates.name {
            Some(name) => {
                let name = validation::role_name(name)?;
                if let Some(existing) = self.find_by_name(&current.project_id, &name).await?
                    && existing.id != id
                {
                    return Err(DbError::conflict(format!(
                        "project already has a role named '{}'",
                        name
                    )));
                }
                field_updates.push("name = $name");
                Some(name)
            }
            None => None,
        };
        let permissions = match &updates.permissions {
            Some(permissions) => {
                field_updates.push("permissions = $permissions");
                permission_names(permissions)
            }
            None => Vec::new(),
        };
        field_updates.push("updated_at = time::now()");

        debug!("Updating role: {}", id);
        let query = format!("UPDATE $record SET {}", field_updates.join(", "));
        let conflict_name = name.clone();
        let mut response = self
            .client
            .query(query)
            .bind(("record", record("project_role", id)))
            .bind(("name", name))
            .bind(("permissions", permissions))
            .await
            .and_then(|response| response.check())
            .map_err(|e| {
                conflict_or_query(e, || {
                    format!(
                        "project already has a role named '{}'",
                        conflict_name.unwrap_or_default()
                    )
                })
            })?;

        let role: Option<ProjectRole> = response.take(0)?;
        role.ok_or_else(|| DbError::not_found("Role", id))
    }

    /// Delete a role after unassigning it from every member.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!("Deleting role: {}", id);
        MembershipRepository::new(self.client).clear_role(id).await?;
        self.client
            .query("DELETE $record")
            .bind(("record", record("project_role", id)))
            .await?
            .check()?;
        Ok(())
    }
}
