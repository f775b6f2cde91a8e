//! Time entry repository
//!
//! A user has at most one running timer (an entry without `ended_at`)
//! across all tasks. Manually logged entries are created already finished.

use super::{conflict_or_query, record, unique_id, validation};
use crate::error::{DbError, DbResult};
use crate::models::{Task, TimeEntry, TimeSummary, UserTime};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use surrealdb::sql::Datetime;
use tracing::debug;

/// Repository for time tracking
pub struct TimeEntryRepository<'a> {
    client: &'a Surreal<Db>,
}

/// Whole seconds between two instants, never negative.
fn elapsed_seconds(started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> i64 {
    (ended_at - started_at).num_seconds().max(0)
}

/// Fold finished entries into a per-task summary.
fn summarize(task: &Task, entries: &[TimeEntry]) -> TimeSummary {
    let mut by_user: BTreeMap<&str, i64> = BTreeMap::new();
    let mut total_seconds = 0;
    let mut finished = 0;

    for entry in entries {
        let Some(seconds) = entry.seconds else {
            continue;
        };
        finished += 1;
        total_seconds += seconds;
        *by_user.entry(entry.user_id.as_str()).or_default() += seconds;
    }

    TimeSummary {
        task_id: task.id.clone(),
        total_seconds,
        pomodoros: task.pomodoros,
        entries: finished,
        by_user: by_user
            .into_iter()
            .map(|(user_id, seconds)| UserTime {
                user_id: user_id.to_string(),
                seconds,
            })
            .collect(),
    }
}

impl<'a> TimeEntryRepository<'a> {
    pub fn new(client: &'a Surreal<Db>) -> Self {
        Self { client }
    }

    async fn require_task(&self, task_id: &str) -> DbResult<Task> {
        let task: Option<Task> = self
            .client
            .select(("task", task_id))
            .await
            .map_err(|e| DbError::Query(Box::new(e)))?;
        task.ok_or_else(|| DbError::not_found("Task", task_id))
    }

    /// Start a timer for `user_id` on a task.
    ///
    /// # Errors
    ///
    /// Returns `DbError::NotFound` if the task doesn't exist.
    /// Returns `DbError::Conflict` if the user already has a running timer.
    pub async fn start(&self, task_id: &str, user_id: &str, pomodoro: bool) -> DbResult<TimeEntry> {
        self.require_task(task_id).await?;
        if let Some(running) = self.running_for(user_id).await? {
            return Err(DbError::conflict(format!(
                "a timer is already running on task '{}'",
                running.task_id
            )));
        }

        let id = unique_id(self.client, "time_entry", &format!("{task_id}/{user_id}")).await?;
        debug!("Starting timer: {} on task {} for {}", id, task_id, user_id);

        // Claiming the user's lock row fails if another start got there first
        self.client
            .query(
                r#"
                BEGIN TRANSACTION;
                CREATE $lock SET entry_id = $id;
                CREATE $record SET
                    task_id = $task_id,
                    user_id = $user_id,
                    started_at = time::now(),
                    pomodoro = $pomodoro;
                COMMIT TRANSACTION;
            "#,
            )
            .bind(("lock", record("running_timer", user_id)))
            .bind(("record", record("time_entry", &id)))
            .bind(("id", id.clone()))
            .bind(("task_id", task_id.to_string()))
            .bind(("user_id", user_id.to_string()))
            .bind(("pomodoro", pomodoro))
            .await
            .and_then(|response| response.check())
            .map_err(|e| conflict_or_query(e, || "a timer is already running".to_string()))?;

        self.require(&id).await
    }

    /// The user's running timer, if any.
    pub async fn running_for(&self, user_id: &str) -> DbResult<Option<TimeEntry>> {
        let mut response = self
            .client
            .query("SELECT * FROM time_entry WHERE user_id = $user_id AND ended_at = NONE LIMIT 1")
            .bind(("user_id", user_id.to_string()))
            .await?;
        let entries: Vec<TimeEntry> = response.take(0)?;
        Ok(entries.into_iter().next())
    }

    /// Stop the user's running timer at `ended_at`.
    ///
    /// An `ended_at` earlier than the start is clamped to the start.
    ///
    /// # Errors
    ///
    /// Returns `DbError::NotFound` if no timer is running.
    pub async fn stop(&self, user_id: &str, ended_at: DateTime<Utc>) -> DbResult<TimeEntry> {
        let running = self
            .running_for(user_id)
            .await?
            .ok_or_else(|| DbError::not_found("Running timer", user_id))?;

        let ended_at = ended_at.max(running.started_at);
        let seconds = elapsed_seconds(running.started_at, ended_at);
        debug!("Stopping timer: {} after {}s", running.id, seconds);

        let mut response = self
            .client
            .query("UPDATE $record SET ended_at = $ended_at, seconds = $seconds")
            .bind(("record", record("time_entry", &running.id)))
            .bind(("ended_at", Datetime::from(ended_at)))
            .bind(("seconds", seconds))
            .await?;
        let entry: Option<TimeEntry> = response.take(0)?;
        entry.ok_or_else(|| DbError::not_found("Time entry", running.id))
    }

    /// Record a finished span of work.
    ///
    /// # Errors
    ///
    /// Returns `DbError::ValidationError` unless `ended_at` is after
    /// `started_at`.
    pub async fn log_manual(
        &self,
        task_id: &str,
        user_id: &str,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        note: Option<&str>,
    ) -> DbResult<TimeEntry> {
        if ended_at <= started_at {
            return Err(DbError::invalid("ended_at must be after started_at"));
        }
        let note = validation::optional_text("note", note, validation::MAX_DESCRIPTION_LEN)?;
        self.require_task(task_id).await?;

        let id = unique_id(self.client, "time_entry", &format!("{task_id}/{user_id}")).await?;
        debug!("Logging time entry: {} on task {} for {}", id, task_id, user_id);

        self.client
            .query(
                r#"CREATE $record SET
                    task_id = $task_id,
                    user_id = $user_id,
                    started_at = $started_at,
                    ended_at = $ended_at,
                    seconds = $seconds,
                    note = $note"#,
            )
            .bind(("record", record("time_entry", &id)))
            .bind(("task_id", task_id.to_string()))
            .bind(("user_id", user_id.to_string()))
            .bind(("started_at", Datetime::from(started_at)))
            .bind(("ended_at", Datetime::from(ended_at)))
            .bind(("seconds", elapsed_seconds(started_at, ended_at)))
            .bind(("note", note))
            .await?
            .check()?;

        self.require(&id).await
    }

    /// Entries on a task, earliest start first.
    pub async fn list_for_task(&self, task_id: &str) -> DbResult<Vec<TimeEntry>> {
        let mut response = self
            .client
            .query("SELECT * FROM time_entry WHERE task_id = $task_id ORDER BY started_at ASC")
            .bind(("task_id", task_id.to_string()))
            .await?;
        let entries: Vec<TimeEntry> = response.take(0)?;
        Ok(entries)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<TimeEntry>> {
        let entry: Option<TimeEntry> = self
            .client
            .select(("time_entry", id))
            .await
            .map_err(|e| DbError::Query(Box::new(e)))?;
        Ok(entry)
    }

    pub async fn require(&self, id: &str) -> DbResult<TimeEntry> {
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Time entry", id))
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!("Deleting time entry: {}", id);
        self.client
            .query("DELETE $record")
            .bind(("record", record("time_entry", id)))
            .await?
            .check()?;
        Ok(())
    }

    /// Total tracked time on a task. Running timers are not counted.
    pub async fn summary_for_task(&self, task_id: &str) -> DbResult<TimeSummary> {
        let task = self.require_task(task_id).await?;
        let entries = self.list_for_task(task_id).await?;
        Ok(summarize(&task, &entries))
    }
}
