//! Timers, manual time entries and summaries

use super::ApiJson;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::guard::ProjectRelation::{self, Creator, Member};
use crate::guard::{DenyReason, require_permission, require_project_relation};
use crate::state::AppState;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tasktrack_db::{Database, DbError, Permission, Task, TimeEntry, TimeSummary, validate_id};
use tracing::{debug, info};

const VIEW_TIME: &[ProjectRelation] = &[Creator, Member];

#[derive(Debug, Deserialize)]
struct StartTimer {
    #[serde(default)]
    pomodoro: bool,
}

#[derive(Debug, Deserialize)]
struct LogTime {
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    note: Option<String>,
}

/// A stopped timer and whether it counted as a pomodoro
#[derive(Debug, Serialize)]
struct StoppedTimer {
    #[serde(flatten)]
    entry: TimeEntry,
    pomodoro_completed: bool,
}

async fn load_task(db: &Database, id: &str) -> Result<Task, ApiError> {
    validate_id(id)?;
    Ok(db.tasks().require(id).await?)
}

async fn start_timer(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<StartTimer>,
) -> Result<(StatusCode, ApiJson<TimeEntry>), ApiError> {
    let task = load_task(&state.db, &id).await?;
    require_permission(&state.db, caller.id(), &task.project_id, Permission::TimeTrack).await?;

    let entry = state
        .db
        .time_entries()
        .start(&id, caller.id(), request.pomodoro)
        .await?;
    info!(entry_id = %entry.id, task_id = %id, pomodoro = request.pomodoro, "timer started");
    Ok((StatusCode::CREATED, ApiJson(entry)))
}

async fn running_timer(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<ApiJson<Option<TimeEntry>>, ApiError> {
    let entry = state.db.time_entries().running_for(caller.id()).await?;
    Ok(ApiJson(entry))
}

/// Stop the caller's running timer.
///
/// A pomodoro timer that ran for the configured length adds one completed
/// pomodoro to its task.
async fn stop_timer(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<ApiJson<StoppedTimer>, ApiError> {
    let entry = state.db.time_entries().stop(caller.id(), Utc::now()).await?;

    let pomodoro_completed = entry.completes_pomodoro(state.config.pomodoro_length())
        && credit_pomodoro(&state.db, &entry.task_id).await?;
    info!(entry_id = %entry.id, seconds = ?entry.seconds, "timer stopped");
    Ok(ApiJson(StoppedTimer {
        entry,
        pomodoro_completed,
    }))
}

/// Add a completed pomodoro to a task. A task deleted while its timer ran
/// gets no credit.
async fn credit_pomodoro(db: &Database, task_id: &str) -> Result<bool, ApiError> {
    match db.tasks().increment_pomodoros(task_id).await {
        Ok(task) => {
            debug!(task_id = %task.id, pomodoros = task.pomodoros, "pomodoro completed");
            Ok(true)
        }
        Err(DbError::NotFound { .. }) => {
            debug!(task_id, "pomodoro finished on a deleted task");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

async fn log_time(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<LogTime>,
) -> Result<(StatusCode, ApiJson<TimeEntry>), ApiError> {
    let task = load_task(&state.db, &id).await?;
    require_permission(&state.db, caller.id(), &task.project_id, Permission::TimeTrack).await?;

    let entry = state
        .db
        .time_entries()
        .log_manual(
            &id,
            caller.id(),
            request.started_at,
            request.ended_at,
            request.note.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, ApiJson(entry)))
}

async fn list_entries(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<ApiJson<Vec<TimeEntry>>, ApiError> {
    let task = load_task(&state.db, &id).await?;
    require_project_relation(&state.db, caller.id(), &task.project_id, VIEW_TIME).await?;
    let entries = state.db.time_entries().list_for_task(&id).await?;
    Ok(ApiJson(entries))
}

async fn summary(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<ApiJson<TimeSummary>, ApiError> {
    let task = load_task(&state.db, &id).await?;
    require_project_relation(&state.db, caller.id(), &task.project_id, VIEW_TIME).await?;
    let summary = state.db.time_entries().summary_for_task(&id).await?;
    Ok(ApiJson(summary))
}

/// Whether `user_id` may delete `entry`. The project creator may delete
/// any entry while they remain in the project's workspace.
fn may_delete(entry: &TimeEntry, user_id: &str, is_project_creator: bool) -> bool {
    entry.user_id == user_id || is_project_creator
}

async fn delete_entry(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    validate_id(&id)?;
    let entries = state.db.time_entries();
    let entry = entries.require(&id).await?;
    let task = state.db.tasks().require(&entry.task_id).await?;
    let project = state.db.projects().require(&task.project_id).await?;

    let is_project_creator = project.creator_id == caller.id()
        && state
            .db
            .memberships()
            .workspace_role(caller.id(), &project.workspace_id)
            .await?
            .is_some();

    if !may_delete(&entry, caller.id(), is_project_creator) {
        debug!(user_id = caller.id(), entry_id = %id, "time entry deletion denied");
        return Err(ApiError::forbidden(DenyReason::NotOwner));
    }
    entries.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/timer", get(running_timer).delete(stop_timer))
        .route("/tasks/{id}/timer", post(start_timer))
        .route("/tasks/{id}/time-entries", get(list_entries).post(log_time))
        .route("/tasks/{id}/time-summary", get(summary))
        .route("/time-entries/{id}", delete(delete_entry))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(user_id: &str) -> TimeEntry {
        TimeEntry {
            id: "e1".to_string(),
            task_id: "t1".to_string(),
            user_id: user_id.to_string(),
            started_at: Utc::now(),
            ended_at: None,
            seconds: None,
            pomodoro: false,
            note: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_may_delete() {
        let entry = entry("alice");
        assert!(may_delete(&entry, "alice", false));
        assert!(may_delete(&entry, "carol", true));
        assert!(!may_delete(&entry, "bob", false));
    }

    #[tokio::test]
    async fn test_credit_pomodoro_on_deleted_task() {
        let db = Database::connect_memory().await.unwrap();
        db.init().await.unwrap();

        assert!(!credit_pomodoro(&db, "gone").await.unwrap());
    }

    #[test]
    fn test_start_timer_body_defaults() {
        let request: StartTimer = serde_json::from_str("{}").unwrap();
        assert!(!request.pomodoro);
    }

    #[test]
    fn test_stopped_timer_flattens_entry() {
        let stopped = StoppedTimer {
            entry: entry("alice"),
            pomodoro_completed: true,
        };
        let json = serde_json::to_value(&stopped).unwrap();
        assert_eq!(json["user_id"], "alice");
        assert_eq!(json["pomodoro_completed"], true);
    }
}
