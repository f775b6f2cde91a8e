use std::path::PathBuf;
use thiserror::Error;

/// Database error types for Tasktrack
#[derive(Error, Debug)]
pub enum DbError {
    /// Error establishing connection to the database
    #[error("Failed to connect to database at {path}: {source}")]
    Connection {
        path: PathBuf,
        #[source]
        source: Box<surrealdb::Error>,
    },

    /// Error during schema initialization
    #[error("Failed to initialize database schema: {0}")]
    Schema(#[source] Box<surrealdb::Error>),

    /// Error executing a query
    #[error("Query execution failed")]
    Query(#[source] Box<surrealdb::Error>),

    /// Error creating database directory
    #[error("Failed to create database directory at {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A requested record does not exist
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// The write would violate a uniqueness or ownership rule
    #[error("{message}")]
    Conflict { message: String },

    /// Error for invalid input or validation failure
    #[error("{message}")]
    ValidationError { message: String },
}

impl From<surrealdb::Error> for DbError {
    fn from(err: surrealdb::Error) -> Self {
        DbError::Query(Box::new(err))
    }
}

impl DbError {
    /// Shorthand for a `NotFound` error.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Shorthand for a `Conflict` error.
    pub fn conflict(message: impl Into<String>) -> Self {
        DbError::Conflict {
            message: message.into(),
        }
    }

    /// Shorthand for a `ValidationError`.
    pub fn invalid(message: impl Into<String>) -> Self {
        DbError::ValidationError {
            message: message.into(),
        }
    }

    /// Get the full error message including nested SurrealDB error details.
    ///
    /// This is useful for displaying detailed error information to users.
    pub fn full_message(&self) -> String {
        match self {
            DbError::Query(err) => format!("Query execution failed: {}", err),
            other => other.to_string(),
        }
    }
}

/// Result type alias for database operations
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_directory_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = DbError::CreateDirectory {
            path: PathBuf::from("/root/tasktrack"),
            source: io_err,
        };
        assert_eq!(
            err.to_string(),
            "Failed to create database directory at /root/tasktrack: access denied"
        );
    }

    #[test]
    fn test_not_found_error_display() {
        let err = DbError::not_found("Project", "ab12cd34");
        assert_eq!(err.to_string(), "Project 'ab12cd34' not found");
    }

    #[test]
    fn test_not_found_error_debug() {
        let err = DbError::not_found("Task", "xyz789");
        let debug_str = format!("{:?}", err);
        assert!(
            debug_str.contains("NotFound") && debug_str.contains("xyz789"),
            "Debug output should contain NotFound and the id"
        );
    }

    #[test]
    fn test_conflict_error_display() {
        let err = DbError::conflict("email 'a@b.c' is already registered");
        assert_eq!(err.to_string(), "email 'a@b.c' is already registered");
    }

    #[test]
    fn test_validation_error_display() {
        let err = DbError::invalid("title cannot be empty");
        assert_eq!(err.to_string(), "title cannot be empty");
    }

    #[test]
    fn test_full_message_passes_through_non_query_errors() {
        let err = DbError::invalid("bad input");
        assert_eq!(err.full_message(), "bad input");
    }

    #[test]
    fn test_db_result_type_alias() {
        let ok_result: DbResult<i32> = Ok(42);
        assert_eq!(ok_result.unwrap(), 42);

        let err_result: DbResult<i32> = Err(DbError::conflict("taken"));
        assert!(err_result.is_err());
    }
}
