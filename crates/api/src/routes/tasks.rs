//! Tasks inside projects

use super::{ApiJson, nullable};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::guard::ProjectRelation::{self, Creator, Member};
use crate::guard::{require_permission, require_project_relation};
use crate::state::AppState;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::str::FromStr;
use tasktrack_db::{
    Database, NewTask, Permission, Priority, Task, TaskFilter, TaskStatus, TaskUpdate, validate_id,
};
use tracing::info;

const VIEW_TASKS: &[ProjectRelation] = &[Creator, Member];

#[derive(Debug, Deserialize)]
struct CreateTask {
    title: String,
    description: Option<String>,
    priority: Option<Priority>,
    assignee_id: Option<String>,
    due_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct UpdateTask {
    title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    description: Option<Option<String>>,
    status: Option<TaskStatus>,
    #[serde(default, deserialize_with = "nullable")]
    priority: Option<Option<Priority>>,
    #[serde(default, deserialize_with = "nullable")]
    due_at: Option<Option<DateTime<Utc>>>,
}

#[derive(Debug, Deserialize)]
struct SetAssignee {
    assignee_id: Option<String>,
}

/// Query string of the task listing.
///
/// `status` and `priority` take comma-separated values. `assignee` is a
/// user id, `me` or `none`.
#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    status: Option<String>,
    priority: Option<String>,
    assignee: Option<String>,
    q: Option<String>,
}

fn parse_list<T>(raw: &str) -> Result<Vec<T>, ApiError>
where
    T: FromStr<Err = String>,
{
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| value.parse::<T>().map_err(ApiError::invalid))
        .collect()
}

impl ListQuery {
    fn into_filter(self, project_id: &str, caller_id: &str) -> Result<TaskFilter, ApiError> {
        let mut filter = TaskFilter::new().in_project(project_id);
        if let Some(status) = self.status {
            filter = filter.with_statuses(parse_list::<TaskStatus>(&status)?);
        }
        if let Some(priority) = self.priority {
            filter = filter.with_priorities(parse_list::<Priority>(&priority)?);
        }
        match self.assignee.as_deref().map(str::trim) {
            None | Some("") => {}
            Some("me") => filter = filter.assigned_to(caller_id),
            Some("none") => filter = filter.unassigned(),
            Some(user_id) => {
                validate_id(user_id)?;
                filter = filter.assigned_to(user_id);
            }
        }
        if let Some(q) = self.q {
            filter = filter.matching(q);
        }
        Ok(filter)
    }
}

async fn load_task(db: &Database, id: &str) -> Result<Task, ApiError> {
    validate_id(id)?;
    Ok(db.tasks().require(id).await?)
}

async fn create_task(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<CreateTask>,
) -> Result<(StatusCode, ApiJson<Task>), ApiError> {
    require_permission(&state.db, caller.id(), &id, Permission::TaskCreate).await?;

    let mut task = NewTask::titled(request.title);
    if let Some(description) = request.description {
        task = task.with_description(description);
    }
    if let Some(priority) = request.priority {
        task = task.with_priority(priority);
    }
    if let Some(assignee) = request.assignee_id {
        validate_id(&assignee)?;
        task = task.with_assignee(assignee);
    }
    if let Some(due_at) = request.due_at {
        task = task.with_due_at(due_at);
    }

    let task = state.db.tasks().create(&id, caller.id(), &task).await?;
    info!(task_id = %task.id, project_id = %id, "created task");
    Ok((StatusCode::CREATED, ApiJson(task)))
}

async fn list_tasks(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<ApiJson<Vec<Task>>, ApiError> {
    require_project_relation(&state.db, caller.id(), &id, VIEW_TASKS).await?;
    let filter = query.into_filter(&id, caller.id())?;
    let tasks = state.db.tasks().list(&filter).await?;
    Ok(ApiJson(tasks))
}

async fn get_task(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<ApiJson<Task>, ApiError> {
    let task = load_task(&state.db, &id).await?;
    require_project_relation(&state.db, caller.id(), &task.project_id, VIEW_TASKS).await?;
    Ok(ApiJson(task))
}

async fn update_task(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<UpdateTask>,
) -> Result<ApiJson<Task>, ApiError> {
    let task = load_task(&state.db, &id).await?;
    require_permission(&state.db, caller.id(), &task.project_id, Permission::TaskUpdate).await?;

    let mut update = TaskUpdate::new();
    if let Some(title) = request.title {
        update = update.with_title(title);
    }
    if let Some(description) = request.description {
        update = update.with_description(description);
    }
    if let Some(status) = request.status {
        update = update.with_status(status);
    }
    match request.priority {
        Some(Some(priority)) => update = update.with_priority(priority),
        Some(None) => update = update.clear_priority(),
        None => {}
    }
    if let Some(due_at) = request.due_at {
        update = update.with_due_at(due_at);
    }

    let task = state.db.tasks().update(&id, &update).await?;
    Ok(ApiJson(task))
}

/// Assign the task to a project member, or unassign it with `null`.
async fn set_assignee(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<SetAssignee>,
) -> Result<ApiJson<Task>, ApiError> {
    let task = load_task(&state.db, &id).await?;
    require_permission(&state.db, caller.id(), &task.project_id, Permission::TaskAssign).await?;
    if let Some(assignee) = &request.assignee_id {
        validate_id(assignee)?;
    }

    let update = TaskUpdate::new().with_assignee(request.assignee_id);
    let task = state.db.tasks().update(&id, &update).await?;
    Ok(ApiJson(task))
}

async fn delete_task(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let task = load_task(&state.db, &id).await?;
    require_permission(&state.db, caller.id(), &task.project_id, Permission::TaskDelete).await?;
    state.db.tasks().delete(&id).await?;
    info!(task_id = %id, "deleted task");
    Ok(StatusCode::NO_CONTENT)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/projects/{id}/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/{id}",
            get(get_task).patch(update_task).delete(delete_task),
        )
        .route("/tasks/{id}/assignee", put(set_assignee))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasktrack_db::AssigneeFilter;

    #[test]
    fn test_parse_list() {
        let statuses = parse_list::<TaskStatus>("todo, in_progress,,").unwrap();
        assert_eq!(statuses, vec![TaskStatus::Todo, TaskStatus::InProgress]);

        let err = parse_list::<Priority>("high,extreme").unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[test]
    fn test_list_query_into_filter() {
        let query = ListQuery {
            status: Some("done".to_string()),
            priority: Some("low,urgent".to_string()),
            assignee: Some("me".to_string()),
            q: Some("  Launch ".to_string()),
        };
        let filter = query.into_filter("p1", "u1").unwrap();

        assert_eq!(filter.project_id.as_deref(), Some("p1"));
        assert_eq!(filter.statuses, vec![TaskStatus::Done]);
        assert_eq!(filter.priorities, vec![Priority::Low, Priority::Urgent]);
        assert_eq!(filter.assignee, Some(AssigneeFilter::User("u1".to_string())));
        assert_eq!(filter.query.as_deref(), Some("launch"));
    }

    #[test]
    fn test_list_query_assignee_forms() {
        let none = ListQuery {
            assignee: Some("none".to_string()),
            ..ListQuery::default()
        };
        assert_eq!(
            none.into_filter("p1", "u1").unwrap().assignee,
            Some(AssigneeFilter::Unassigned)
        );

        let other = ListQuery {
            assignee: Some("u2".to_string()),
            ..ListQuery::default()
        };
        assert_eq!(
            other.into_filter("p1", "u1").unwrap().assignee,
            Some(AssigneeFilter::User("u2".to_string()))
        );

        let bad = ListQuery {
            assignee: Some("no/slashes".to_string()),
            ..ListQuery::default()
        };
        assert!(bad.into_filter("p1", "u1").is_err());
    }

    #[test]
    fn test_update_task_priority_null_clears() {
        let request: UpdateTask = serde_json::from_str(r#"{"priority": null}"#).unwrap();
        assert_eq!(request.priority, Some(None));

        let request: UpdateTask = serde_json::from_str(r#"{"priority": "high"}"#).unwrap();
        assert_eq!(request.priority, Some(Some(Priority::High)));
    }
}
