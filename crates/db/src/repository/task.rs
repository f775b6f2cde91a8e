//! Task repository for CRUD operations on tasks
//!
//! Status changes keep the lifecycle timestamps in step: the first move to
//! `in_progress` stamps `started_at`, moving to `done` stamps
//! `completed_at`, and leaving `done` clears it again.

use super::filter::TaskFilter;
use super::{MembershipRepository, record, unique_id, validation};
use crate::error::{DbError, DbResult};
use crate::models::{Priority, Task, TaskStatus};
use chrono::{DateTime, Utc};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use surrealdb::sql::Datetime;
use tracing::{debug, trace};

/// Repository for task CRUD operations
pub struct TaskRepository<'a> {
    client: &'a Surreal<Db>,
}

/// Fields for a new task
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub assignee_id: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_assignee(mut self, user_id: impl Into<String>) -> Self {
        self.assignee_id = Some(user_id.into());
        self
    }

    pub fn with_due_at(mut self, due_at: DateTime<Utc>) -> Self {
        self.due_at = Some(due_at);
        self
    }
}

/// Update structure for partial task updates
///
/// Nullable fields use `Option<Option<_>>`: `Some(None)` clears the value.
#[derive(Debug, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Option<Priority>>,
    pub assignee_id: Option<Option<String>>,
    pub due_at: Option<Option<DateTime<Utc>>>,
}

impl TaskUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(Some(priority));
        self
    }

    pub fn clear_priority(mut self) -> Self {
        self.priority = Some(None);
        self
    }

    pub fn with_assignee(mut self, user_id: Option<String>) -> Self {
        self.assignee_id = Some(user_id);
        self
    }

    pub fn with_due_at(mut self, due_at: Option<DateTime<Utc>>) -> Self {
        self.due_at = Some(due_at);
        self
    }

    pub fn has_updates(&self) -> bool {
        self.title.is_some()
            || self.description.is_some()
            || self.status.is_some()
            || self.priority.is_some()
            || self.assignee_id.is_some()
            || self.due_at.is_some()
    }
}

/// Timestamp assignments implied by moving `task` to `next`.
fn status_timestamps(task: &Task, next: TaskStatus) -> Vec<&'static str> {
    let mut updates = Vec::new();
    if next == TaskStatus::InProgress && task.started_at.is_none() {
        updates.push("started_at = time::now()");
    }
    if next == TaskStatus::Done && task.status != TaskStatus::Done {
        updates.push("completed_at = time::now()");
    }
    if next != TaskStatus::Done && task.status == TaskStatus::Done {
        updates.push("completed_at = NONE");
    }
    updates
}

impl<'a> TaskRepository<'a> {
    pub fn new(client: &'a Surreal<Db>) -> Self {
        Self { client }
    }

    pub async fn exists(&self, id: &str) -> DbResult<bool> {
        super::record_exists(self.client, "task", id).await
    }

    /// Reject assignees who are not members of the project.
    async fn ensure_assignable(&self, project_id: &str, user_id: &str) -> DbResult<()> {
        let membership = MembershipRepository::new(self.client)
            .project_membership(user_id, project_id)
            .await?;
        if membership.is_none() {
            return Err(DbError::invalid(format!(
                "user '{}' is not a member of this project",
                user_id
            )));
        }
        Ok(())
    }

    /// Create a task in a project with status `todo`.
    ///
    /// # Errors
    ///
    /// Returns `DbError::NotFound` if the project doesn't exist.
    /// Returns `DbError::ValidationError` for a blank title or an assignee
    /// outside the project.
    pub async fn create(&self, project_id: &str, creator_id: &str, task: &NewTask) -> DbResult<Task> {
        let title = validation::name("title", &task.title)?;
        let description = validation::description(task.description.as_deref())?;

        if !super::record_exists(self.client, "project", project_id).await? {
            return Err(DbError::not_found("Project", project_id));
        }
        if let Some(assignee) = &task.assignee_id {
            self.ensure_assignable(project_id, assignee).await?;
        }

        let id = unique_id(self.client, "task", &format!("{project_id}/{title}")).await?;
        debug!("Creating task: {} with title: {}", id, title);
        trace!("Task data: {:?}", task);

        self.client
            .query(
                r#"CREATE $record SET
                    project_id = $project_id,
                    title = $title,
                    description = $description,
                    status = "todo",
                    priority = $priority,
                    assignee_id = $assignee_id,
                    creator_id = $creator_id,
                    due_at = $due_at"#,
            )
            .bind(("record", record("task", &id)))
            .bind(("project_id", project_id.to_string()))
            .bind(("title", title))
            .bind(("description", description))
            .bind(("priority", task.priority.map(|p| p.as_str())))
            .bind(("assignee_id", task.assignee_id.clone()))
            .bind(("creator_id", creator_id.to_string()))
            .bind(("due_at", task.due_at.map(Datetime::from)))
            .await?
            .check()?;

        self.require(&id).await
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Task>> {
        debug!("Fetching task: {}", id);
        let task: Option<Task> = self.client.select(("task", id)).await.map_err(|e| {
            debug!("Failed to fetch task: {}: {}", id, e);
            DbError::Query(Box::new(e))
        })?;
        Ok(task)
    }

    pub async fn require(&self, id: &str) -> DbResult<Task> {
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Task", id))
    }

    /// List tasks matching `filter`, oldest first.
    pub async fn list(&self, filter: &TaskFilter) -> DbResult<Vec<Task>> {
        let query = filter.to_query();
        trace!("Query: {}", query);
        let bindings = filter.bindings();

        let mut response = self
            .client
            .query(query)
            .bind(("project_id", bindings.project_id))
            .bind(("statuses", bindings.statuses))
            .bind(("priorities", bindings.priorities))
            .bind(("assignee", bindings.assignee))
            .bind(("query", bindings.query))
            .await?;
        let tasks: Vec<Task> = response.take(0)?;
        Ok(tasks)
    }

    /// Apply partial updates and return the updated task.
    ///
    /// # Errors
    ///
    /// Returns `DbError::NotFound` if the task doesn't exist.
    /// Returns `DbError::ValidationError` for a blank title or an assignee
    /// outside the project.
    pub async fn update(&self, id: &str, updates: &TaskUpdate) -> DbResult<Task> {
        debug!("Updating task: {}", id);
        trace!("Updates: {:?}", updates);

        let current = self.require(id).await?;
        if !updates.has_updates() {
            debug!("No updates specified for task: {}", id);
            return Ok(current);
        }

        let mut field_updates: Vec<&'static str> = Vec::new();

        let title = match &updates.title {
            Some(title) => {
                field_updates.push("title = $title");
                Some(validation::name("title", title)?)
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
        if let Some(status) = updates.status {
            field_updates.push("status = $status");
            field_updates.extend(status_timestamps(&current, status));
        }
        if updates.priority.is_some() {
            field_updates.push("priority = $priority");
        }
        if let Some(assignee) = &updates.assignee_id {
            if let Some(user_id) = assignee {
                self.ensure_assignable(&current.project_id, user_id).await?;
            }
            field_updates.push("assignee_id = $assignee_id");
        }
        if updates.due_at.is_some() {
            field_updates.push("due_at = $due_at");
        }
        field_updates.push("updated_at = time::now()");

        let query = format!("UPDATE $record SET {}", field_updates.join(", "));
        trace!("Query: {}", query);
        let mut response = self
            .client
            .query(query)
            .bind(("record", record("task", id)))
            .bind(("title", title))
            .bind(("description", description))
            .bind(("status", updates.status.map(|s| s.as_str())))
            .bind(("priority", updates.priority.flatten().map(|p| p.as_str())))
            .bind(("assignee_id", updates.assignee_id.clone().flatten()))
            .bind(("due_at", updates.due_at.flatten().map(Datetime::from)))
            .await?;

        let task: Option<Task> = response.take(0)?;
        task.ok_or_else(|| DbError::not_found("Task", id))
    }

    /// Count one more completed pomodoro on a task.
    pub async fn increment_pomodoros(&self, id: &str) -> DbResult<Task> {
        debug!("Incrementing pomodoros for task: {}", id);
        let mut response = self
            .client
            .query("UPDATE $record SET pomodoros += 1, updated_at = time::now()")
            .bind(("record", record("task", id)))
            .await?;
        let task: Option<Task> = response.take(0)?;
        task.ok_or_else(|| DbError::not_found("Task", id))
    }

    /// Delete a task and its time entries.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!("Deleting task: {}", id);
        self.client
            .query(
                r#"
                BEGIN TRANSACTION;
                DELETE time_entry WHERE task_id = $id;
                DELETE $record;
                COMMIT TRANSACTION;
            "#,
            )
            .bind(("record", record("task", id)))
            .bind(("id", id.to_string()))
            .await?
            .check()?;
        Ok(())
    }
}
