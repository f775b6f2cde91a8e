//! Repository modules for database operations
//!
//! Provides repository pattern implementations for every entity,
//! encapsulating SurrealDB queries behind typed methods.

mod filter;
mod membership;
mod project;
mod role;
mod task;
mod time_entry;
mod user;
pub mod validation;
mod workspace;

pub use filter::{AssigneeFilter, TaskFilter};
pub use membership::MembershipRepository;
pub use project::{ProjectRepository, ProjectUpdate};
pub use role::{RoleRepository, RoleUpdate};
pub use task::{NewTask, TaskRepository, TaskUpdate};
pub use time_entry::TimeEntryRepository;
pub use user::{UserRepository, UserUpdate};
pub use workspace::{WorkspaceRepository, WorkspaceUpdate};

use crate::error::{DbError, DbResult};
use crate::id::IdGenerator;
use serde::Deserialize;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use surrealdb::sql::Thing;
use tracing::debug;

/// Minimal row for checking record existence
#[derive(Debug, Deserialize)]
struct IdOnly {
    #[allow(dead_code)]
    id: Thing,
}

/// Build a record id for binding into queries.
pub(crate) fn record(table: &str, id: &str) -> Thing {
    Thing::from((table, id))
}

/// Check whether `table:id` exists.
pub(crate) async fn record_exists(client: &Surreal<Db>, table: &str, id: &str) -> DbResult<bool> {
    let row: Option<IdOnly> = client
        .select((table, id))
        .await
        .map_err(|e| DbError::Query(Box::new(e)))?;
    Ok(row.is_some())
}

/// Whether a failed write lost a uniqueness race.
///
/// Covers a unique index rejecting a duplicate ("already contains"), a
/// `CREATE` on a taken record id ("already exists") and a commit aborted by
/// a concurrent write to the same key ("conflict").
pub(crate) fn is_duplicate(err: &surrealdb::Error) -> bool {
    let message = err.to_string();
    ["already contains", "already exists", "conflict"]
        .iter()
        .any(|marker| message.contains(marker))
}

/// Map a write error to `DbError::Conflict` when it lost a uniqueness race.
pub(crate) fn conflict_or_query(err: surrealdb::Error, message: impl FnOnce() -> String) -> DbError {
    if is_duplicate(&err) {
        debug!("Write rejected as duplicate: {}", err);
        DbError::conflict(message())
    } else {
        DbError::Query(Box::new(err))
    }
}

/// Generate a key for `table` that doesn't collide with an existing record.
pub(crate) async fn unique_id(client: &Surreal<Db>, table: &str, seed: &str) -> DbResult<String> {
    let mut generator = IdGenerator::new(seed);

    while let Some(id) = generator.next_id() {
        if !record_exists(client, table, &id).await? {
            return Ok(id);
        }
    }

    Err(DbError::invalid(format!(
        "failed to generate a unique {} id after maximum retries",
        table
    )))
}
