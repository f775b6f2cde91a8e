//! Storage layer for Tasktrack
//!
//! Provides SurrealDB connection management with an embedded SurrealKV
//! backend (or an in-memory engine), schema initialization, data models
//! and one repository per entity.

pub mod error;
pub mod id;
pub mod models;
pub mod repository;
pub mod schema;

pub use error::{DbError, DbResult};
pub use id::validate_id;
pub use models::{
    MemberRole, Permission, Priority, Project, ProjectMember, ProjectRole, Task, TaskStatus,
    TimeEntry, TimeSummary, User, UserTime, Workspace, WorkspaceKind, WorkspaceMember,
};
pub use repository::{
    AssigneeFilter, MembershipRepository, NewTask, ProjectRepository, ProjectUpdate,
    RoleRepository, RoleUpdate, TaskFilter, TaskRepository, TaskUpdate, TimeEntryRepository,
    UserRepository, UserUpdate, WorkspaceRepository, WorkspaceUpdate,
};

use std::path::{Path, PathBuf};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem, SurrealKv};

/// Default database path relative to the platform data directory
pub const DEFAULT_DB_PATH: &str = "tasktrack/data";

/// Fallback database path relative to the working directory
pub const FALLBACK_DB_PATH: &str = ".tasktrack/data";

/// Database wrapper providing connection management for SurrealDB
pub struct Database {
    /// The underlying SurrealDB client
    client: Surreal<Db>,
    /// Path where the database is stored, `None` for in-memory databases
    path: Option<PathBuf>,
}

impl Database {
    /// Connect to a SurrealDB database at the specified path.
    ///
    /// Creates the database directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns `DbError::CreateDirectory` if directory creation fails.
    /// Returns `DbError::Connection` if database connection fails.
    pub async fn connect(path: &Path) -> DbResult<Self> {
        let path = Self::prepare_path(path)?;

        let client =
            Surreal::new::<SurrealKv>(path.clone())
                .await
                .map_err(|e| DbError::Connection {
                    path: path.clone(),
                    source: Box::new(e),
                })?;

        tracing::info!(path = %path.display(), "Opened database");
        Ok(Self {
            client,
            path: Some(path),
        })
    }

    /// Open an in-memory database. Nothing is persisted.
    pub async fn connect_memory() -> DbResult<Self> {
        let client = Surreal::new::<Mem>(())
            .await
            .map_err(|e| DbError::Connection {
                path: PathBuf::from(":memory:"),
                source: Box::new(e),
            })?;

        tracing::info!("Opened in-memory database");
        Ok(Self { client, path: None })
    }

    /// Initialize the database schema.
    ///
    /// Selects the Tasktrack namespace and database, then defines all
    /// tables, relations and indexes.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Schema` if schema initialization fails.
    pub async fn init(&self) -> DbResult<()> {
        self.client
            .use_ns("tasktrack")
            .use_db("main")
            .await
            .map_err(|e| DbError::Schema(Box::new(e)))?;

        schema::init_schema(&self.client).await?;

        Ok(())
    }

    /// Get a reference to the underlying SurrealDB client.
    pub fn client(&self) -> &Surreal<Db> {
        &self.client
    }

    /// Get the path where the database is stored.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn users(&self) -> UserRepository<'_> {
        UserRepository::new(&self.client)
    }

    pub fn workspaces(&self) -> WorkspaceRepository<'_> {
        WorkspaceRepository::new(&self.client)
    }

    pub fn memberships(&self) -> MembershipRepository<'_> {
        MembershipRepository::new(&self.client)
    }

    pub fn projects(&self) -> ProjectRepository<'_> {
        ProjectRepository::new(&self.client)
    }

    pub fn roles(&self) -> RoleRepository<'_> {
        RoleRepository::new(&self.client)
    }

    pub fn tasks(&self) -> TaskRepository<'_> {
        TaskRepository::new(&self.client)
    }

    pub fn time_entries(&self) -> TimeEntryRepository<'_> {
        TimeEntryRepository::new(&self.client)
    }

    /// Get the default database path.
    ///
    /// Returns `<data dir>/tasktrack/data` using the platform's local data
    /// directory, or `.tasktrack/data` relative to the working directory
    /// when the platform has none.
    pub fn default_path() -> PathBuf {
        match dirs::data_local_dir() {
            Some(base) => base.join(DEFAULT_DB_PATH),
            None => PathBuf::from(FALLBACK_DB_PATH),
        }
    }

    /// Prepare the database path by creating missing directories.
    fn prepare_path(path: &Path) -> DbResult<PathBuf> {
        let path = path.to_path_buf();

        if !path.exists() {
            std::fs::create_dir_all(&path).map_err(|e| DbError::CreateDirectory {
                path: path.clone(),
                source: e,
            })?;
        }

        Ok(path)
    }
}

// Ensure Database is Send + Sync for async compatibility
static_assertions::assert_impl_all!(Database: Send, Sync);


#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn unique_temp_dir(label: &str) -> PathBuf {
        env::temp_dir().join(format!(
            "tasktrack-{}-{}-{:?}-{}",
            label,
            std::process::id(),
            std::thread::current().id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    #[test]
    fn test_default_path() {
        let path = Database::default_path();
        assert!(
            path.ends_with(DEFAULT_DB_PATH) || path.ends_with(FALLBACK_DB_PATH),
            "unexpected default path: {:?}",
            path
        );
    }

    #[tokio::test]
    async fn test_connect_memory_and_init() {
        let db = Database::connect_memory().await.unwrap();
        assert!(db.path().is_none());

        let init_result = db.init().await;
        assert!(
            init_result.is_ok(),
            "Failed to init: {:?}",
            init_result.err()
        );
    }

    #[tokio::test]
    async fn test_connect_creates_directory() {
        let temp_dir = unique_temp_dir("nested").join("nested/db");

        let db = Database::connect(&temp_dir).await;
        assert!(db.is_ok(), "Failed to connect: {:?}", db.err());
        assert!(temp_dir.exists());
        assert_eq!(db.unwrap().path(), Some(temp_dir.as_path()));

        let _ = std::fs::remove_dir_all(temp_dir.parent().unwrap().parent().unwrap());
    }

    #[test]
    fn test_prepare_path_existing_directory() {
        let temp_dir = env::temp_dir();
        let result = Database::prepare_path(&temp_dir);
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), temp_dir);
    }

    #[test]
    fn test_prepare_path_creates_directories() {
        let temp_dir = unique_temp_dir("prepare").join("sub/dir");

        let result = Database::prepare_path(&temp_dir);
        assert!(result.is_ok());
        assert!(temp_dir.exists());

        let _ = std::fs::remove_dir_all(temp_dir.parent().unwrap().parent().unwrap());
    }

    #[tokio::test]
    async fn test_repository_accessors_share_client() {
        let db = Database::connect_memory().await.unwrap();
        db.init().await.unwrap();

        let user = db
            .users()
            .create("grace@example.com", "Grace", "hash")
            .await
            .unwrap();
        let fetched = db.users().get(&user.id).await.unwrap();
        assert_eq!(fetched.map(|u| u.email), Some("grace@example.com".to_string()));
    }
}
