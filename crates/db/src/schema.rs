//! Database schema initialization for Tasktrack
//!
//! Defines the SurrealDB schema for users, workspaces, projects, project
//! roles, tasks, time entries and running-timer locks, plus the membership relations
//! (`member_of` for workspaces, `works_on` for projects).

use crate::error::DbError;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

/// SQL statements for schema initialization
mod sql {
    pub const DEFINE_USER_TABLE: &str = r#"
        DEFINE TABLE IF NOT EXISTS user SCHEMAFULL;

        DEFINE FIELD IF NOT EXISTS email ON user TYPE string;
        DEFINE FIELD IF NOT EXISTS name ON user TYPE string;
        DEFINE FIELD IF NOT EXISTS password_hash ON user TYPE string;
        DEFINE FIELD IF NOT EXISTS created_at ON user TYPE datetime DEFAULT time::now();
        DEFINE FIELD IF NOT EXISTS updated_at ON user TYPE datetime DEFAULT time::now();

        DEFINE INDEX IF NOT EXISTS user_email ON user FIELDS email UNIQUE;
    "#;

    pub const DEFINE_WORKSPACE_TABLE: &str = r#"
        DEFINE TABLE IF NOT EXISTS workspace SCHEMAFULL;

        DEFINE FIELD IF NOT EXISTS name ON workspace TYPE string;
        DEFINE FIELD IF NOT EXISTS description ON workspace TYPE option<string>;
        DEFINE FIELD IF NOT EXISTS kind ON workspace TYPE string
            ASSERT $value IN ["personal", "group"];
        DEFINE FIELD IF NOT EXISTS owner_id ON workspace TYPE string;
        DEFINE FIELD IF NOT EXISTS created_at ON workspace TYPE datetime DEFAULT time::now();
        DEFINE FIELD IF NOT EXISTS updated_at ON workspace TYPE datetime DEFAULT time::now();

        DEFINE INDEX IF NOT EXISTS workspace_owner ON workspace FIELDS owner_id;
    "#;

    pub const DEFINE_PROJECT_TABLE: &str = r#"
        DEFINE TABLE IF NOT EXISTS project SCHEMAFULL;

        DEFINE FIELD IF NOT EXISTS workspace_id ON project TYPE string;
        DEFINE FIELD IF NOT EXISTS name ON project TYPE string;
        DEFINE FIELD IF NOT EXISTS description ON project TYPE option<string>;
        DEFINE FIELD IF NOT EXISTS creator_id ON project TYPE string;
        DEFINE FIELD IF NOT EXISTS created_at ON project TYPE datetime DEFAULT time::now();
        DEFINE FIELD IF NOT EXISTS updated_at ON project TYPE datetime DEFAULT time::now();

        DEFINE INDEX IF NOT EXISTS project_workspace ON project FIELDS workspace_id;
    "#;

    pub const DEFINE_PROJECT_ROLE_TABLE: &str = r#"
        DEFINE TABLE IF NOT EXISTS project_role SCHEMAFULL;

        DEFINE FIELD IF NOT EXISTS project_id ON project_role TYPE string;
        DEFINE FIELD IF NOT EXISTS name ON project_role TYPE string;
        DEFINE FIELD IF NOT EXISTS permissions ON project_role TYPE array<string> DEFAULT []
            ASSERT $value ALLINSIDE [
                "project:update", "member:manage", "role:manage", "task:create",
                "task:update", "task:assign", "task:delete", "time:track"
            ];
        DEFINE FIELD IF NOT EXISTS created_at ON project_role TYPE datetime DEFAULT time::now();
        DEFINE FIELD IF NOT EXISTS updated_at ON project_role TYPE datetime DEFAULT time::now();

        DEFINE INDEX IF NOT EXISTS project_role_name ON project_role FIELDS project_id, name UNIQUE;
    "#;

    pub const DEFINE_TASK_TABLE: &str = r#"
        DEFINE TABLE IF NOT EXISTS task SCHEMAFULL;

        DEFINE FIELD IF NOT EXISTS project_id ON task TYPE string;
        DEFINE FIELD IF NOT EXISTS title ON task TYPE string;
        DEFINE FIELD IF NOT EXISTS description ON task TYPE option<string>;
        DEFINE FIELD IF NOT EXISTS status ON task TYPE string
            ASSERT $value IN ["todo", "in_progress", "done"];
        DEFINE FIELD IF NOT EXISTS priority ON task TYPE option<string>
            ASSERT $value IN [NONE, "low", "medium", "high", "urgent"];
        DEFINE FIELD IF NOT EXISTS assignee_id ON task TYPE option<string>;
        DEFINE FIELD IF NOT EXISTS creator_id ON task TYPE string;
        DEFINE FIELD IF NOT EXISTS due_at ON task TYPE option<datetime>;
        DEFINE FIELD IF NOT EXISTS pomodoros ON task TYPE int DEFAULT 0;
        DEFINE FIELD IF NOT EXISTS started_at ON task TYPE option<datetime>;
        DEFINE FIELD IF NOT EXISTS completed_at ON task TYPE option<datetime>;
        DEFINE FIELD IF NOT EXISTS created_at ON task TYPE datetime DEFAULT time::now();
        DEFINE FIELD IF NOT EXISTS updated_at ON task TYPE datetime DEFAULT time::now();

        DEFINE INDEX IF NOT EXISTS task_project ON task FIELDS project_id;
    "#;

    pub const DEFINE_TIME_ENTRY_TABLE: &str = r#"
        DEFINE TABLE IF NOT EXISTS time_entry SCHEMAFULL;

        DEFINE FIELD IF NOT EXISTS task_id ON time_entry TYPE string;
        DEFINE FIELD IF NOT EXISTS user_id ON time_entry TYPE string;
        DEFINE FIELD IF NOT EXISTS started_at ON time_entry TYPE datetime;
        DEFINE FIELD IF NOT EXISTS ended_at ON time_entry TYPE option<datetime>;
        DEFINE FIELD IF NOT EXISTS seconds ON time_entry TYPE option<int>;
        DEFINE FIELD IF NOT EXISTS pomodoro ON time_entry TYPE bool DEFAULT false;
        DEFINE FIELD IF NOT EXISTS note ON time_entry TYPE option<string>;
        DEFINE FIELD IF NOT EXISTS created_at ON time_entry TYPE datetime DEFAULT time::now();

        DEFINE INDEX IF NOT EXISTS time_entry_task ON time_entry FIELDS task_id;
        DEFINE INDEX IF NOT EXISTS time_entry_user ON time_entry FIELDS user_id;
    "#;

    /// One row per user with a running timer, keyed by user id.
    ///
    /// Stopping or deleting the running entry releases the row, whichever
    /// statement does it.
    pub const DEFINE_RUNNING_TIMER_TABLE: &str = r#"
        DEFINE TABLE IF NOT EXISTS running_timer SCHEMAFULL;

        DEFINE FIELD IF NOT EXISTS entry_id ON running_timer TYPE string;

        DEFINE EVENT IF NOT EXISTS release_running_timer ON time_entry
            WHEN $event = "DELETE" OR ($event = "UPDATE" AND $before.ended_at = NONE AND $after.ended_at != NONE)
            THEN {
                DELETE running_timer
                    WHERE id = type::thing("running_timer", $before.user_id)
                    AND entry_id = record::id($before.id);
            };
    "#;

    /// user -> member_of -> workspace
    pub const DEFINE_MEMBER_OF_RELATION: &str = r#"
        DEFINE TABLE IF NOT EXISTS member_of TYPE RELATION IN user OUT workspace;

        DEFINE FIELD IF NOT EXISTS role ON member_of TYPE string
            ASSERT $value IN ["owner", "admin", "member"];
        DEFINE FIELD IF NOT EXISTS joined_at ON member_of TYPE datetime DEFAULT time::now();

        DEFINE INDEX IF NOT EXISTS member_of_unique ON member_of FIELDS in, out UNIQUE;
    "#;

    /// user -> works_on -> project
    pub const DEFINE_WORKS_ON_RELATION: &str = r#"
        DEFINE TABLE IF NOT EXISTS works_on TYPE RELATION IN user OUT project;

        DEFINE FIELD IF NOT EXISTS role_id ON works_on TYPE option<string>;
        DEFINE FIELD IF NOT EXISTS joined_at ON works_on TYPE datetime DEFAULT time::now();

        DEFINE INDEX IF NOT EXISTS works_on_unique ON works_on FIELDS in, out UNIQUE;
    "#;

    pub const ALL: [&str; 9] = [
        DEFINE_USER_TABLE,
        DEFINE_WORKSPACE_TABLE,
        DEFINE_PROJECT_TABLE,
        DEFINE_PROJECT_ROLE_TABLE,
        DEFINE_TASK_TABLE,
        DEFINE_TIME_ENTRY_TABLE,
        DEFINE_RUNNING_TIMER_TABLE,
        DEFINE_MEMBER_OF_RELATION,
        DEFINE_WORKS_ON_RELATION,
    ];
}

/// Initialize the database schema.
///
/// Creates every table, relation and index. Idempotent: all definitions
/// use `IF NOT EXISTS`.
///
/// # Errors
///
/// Returns `DbError::Schema` if any schema definition fails.
pub async fn init_schema(client: &Surreal<Db>) -> Result<(), DbError> {
    for statement in sql::ALL {
        client
            .query(statement)
            .await
            .and_then(|response| response.check())
            .map_err(|e| DbError::Schema(Box::new(e)))?;
    }

    Ok(())
}
