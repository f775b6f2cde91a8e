//! User repository for account records

use super::{conflict_or_query, record, unique_id, validation};
use crate::error::{DbError, DbResult};
use crate::models::User;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use tracing::debug;

/// Repository for user CRUD operations
pub struct UserRepository<'a> {
    client: &'a Surreal<Db>,
}

/// Partial update for a user profile
#[derive(Debug, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    /// Replacement password hash (already hashed by the caller)
    pub password_hash: Option<String>,
}

impl UserUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self
    }

    pub fn has_updates(&self) -> bool {
        self.name.is_some() || self.password_hash.is_some()
    }
}

impl<'a> UserRepository<'a> {
    pub fn new(client: &'a Surreal<Db>) -> Self {
        Self { client }
    }

    pub async fn exists(&self, id: &str) -> DbResult<bool> {
        super::record_exists(self.client, "user", id).await
    }

    /// Create a user.
    ///
    /// The email is normalized to lowercase and must not already be registered.
    ///
    /// # Errors
    ///
    /// Returns `DbError::ValidationError` for a malformed email or blank name.
    /// Returns `DbError::Conflict` if the email is taken.
    pub async fn create(&self, email: &str, name: &str, password_hash: &str) -> DbResult<User> {
        let email = validation::email(email)?;
        let name = validation::name("name", name)?;

        if self.find_by_email(&email).await?.is_some() {
            return Err(DbError::conflict(format!(
                "email '{}' is already registered",
                email
            )));
        }

        let id = unique_id(self.client, "user", &email).await?;
        debug!("Creating user: {} <{}>", id, email);

        let mut response = self
            .client
            .query(
                "CREATE $record SET email = $email, name = $name, password_hash = $hash",
            )
            .bind(("record", record("user", &id)))
            .bind(("email", email.clone()))
            .bind(("name", name))
            .bind(("hash", password_hash.to_string()))
            .await
            .and_then(|response| response.check())
            .map_err(|e| {
                conflict_or_query(e, || format!("email '{}' is already registered", email))
            })?;

        let user: Option<User> = response.take(0)?;
        user.ok_or_else(|| DbError::not_found("User", id))
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<User>> {
        debug!("Fetching user: {}", id);
        let user: Option<User> = self
            .client
            .select(("user", id))
            .await
            .map_err(|e| DbError::Query(Box::new(e)))?;
        Ok(user)
    }

    /// Fetch a user, mapping absence to `DbError::NotFound`.
    pub async fn require(&self, id: &str) -> DbResult<User> {
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))
    }

    /// Look up a user by email (case-insensitive).
    pub async fn find_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let mut response = self
            .client
            .query("SELECT * FROM user WHERE email = $email LIMIT 1")
            .bind(("email", email.trim().to_lowercase()))
            .await?;
        let users: Vec<User> = response.take(0)?;
        Ok(users.into_iter().next())
    }

    /// Apply a partial update and return the updated user.
    pub async fn update(&self, id: &str, updates: &UserUpdate) -> DbResult<User> {
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
        if updates.password_hash.is_some() {
            field_updates.push("password_hash = $hash");
        }
        field_updates.push("updated_at = time::now()");

        debug!("Updating user: {}", id);
        let query = format!("UPDATE $record SET {}", field_updates.join(", "));
        let mut response = self
            .client
            .query(query)
            .bind(("record", record("user", id)))
            .bind(("name", name))
            .bind(("hash", updates.password_hash.clone()))
            .await?;

        let user: Option<User> = response.take(0)?;
        user.ok_or_else(|| DbError::not_found("User", id))
    }

    /// Delete a user record and every membership edge it holds.
    ///
    /// Workspaces owned by the user are not touched; callers delete or
    /// reassign them first.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!("Deleting user: {}", id);
        self.client
            .query(
                r#"
                BEGIN TRANSACTION;
                DELETE member_of WHERE in = $record;
                DELETE works_on WHERE in = $record;
                UPDATE task SET assignee_id = NONE WHERE assignee_id = $id;
                DELETE time_entry WHERE user_id = $id AND ended_at = NONE;
                DELETE $record;
                COMMIT TRANSACTION;
            "#,
            )
            .bind(("record", record("user", id)))
            .bind(("id", id.to_string()))
            .await?
            .check()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_db;

    #[tokio::test]
    async fn test_concurrent_creates_with_same_email() {
        let db = create_test_db().await.unwrap();
        let repo = UserRepository::new(&db);

        let (first, second) = tokio::join!(
            repo.create("race@example.com", "First", "hash"),
            repo.create("race@example.com", "Second", "hash"),
        );

        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(DbError::Conflict { .. })))
        );
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let db = create_test_db().await.unwrap();
        let repo = UserRepository::new(&db);

        let user = repo
            .create("Ada@Example.com", "  Ada Lovelace ", "hash")
            .await
            .unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.name, "Ada Lovelace");
        assert_eq!(user.id.len(), crate::id::ID_LENGTH);

        let fetched = repo.get(&user.id).await.unwrap().unwrap();
        assert_eq!(fetched.email, "ada@example.com");
        assert_eq!(fetched.password_hash, "hash");
    }

    #[tokio::test]
    async fn test_create_duplicate_email_conflicts() {
        let db = create_test_db().await.unwrap();
        let repo = UserRepository::new(&db);

        repo.create("ada@example.com", "Ada", "hash").await.unwrap();
        let err = repo
            .create("ADA@example.com", "Other Ada", "hash")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict { .. }), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_email() {
        let db = create_test_db().await.unwrap();
        let repo = UserRepository::new(&db);

        let err = repo.create("not-an-email", "Ada", "hash").await.unwrap_err();
        assert!(matches!(err, DbError::ValidationError { .. }));
    }

    #[tokio::test]
    async fn test_find_by_email_is_case_insensitive() {
        let db = create_test_db().await.unwrap();
        let repo = UserRepository::new(&db);

        let user = repo.create("grace@example.com", "Grace", "hash").await.unwrap();
        let found = repo.find_by_email("GRACE@example.com").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));

        assert!(repo.find_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_name_and_password() {
        let db = create_test_db().await.unwrap();
        let repo = UserRepository::new(&db);

        let user = repo.create("ada@example.com", "Ada", "old").await.unwrap();
        let updated = repo
            .update(
                &user.id,
                &UserUpdate::new().with_name("Countess").with_password_hash("new"),
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Countess");
        assert_eq!(updated.password_hash, "new");
        assert!(updated.updated_at >= user.updated_at);
    }

    #[tokio::test]
    async fn test_update_without_changes_returns_current() {
        let db = create_test_db().await.unwrap();
        let repo = UserRepository::new(&db);

        let user = repo.create("ada@example.com", "Ada", "hash").await.unwrap();
        let same = repo.update(&user.id, &UserUpdate::new()).await.unwrap();
        assert_eq!(same.name, "Ada");
    }

    #[tokio::test]
    async fn test_require_missing_user() {
        let db = create_test_db().await.unwrap();
        let repo = UserRepository::new(&db);

        let err = repo.require("missing").await.unwrap_err();
        assert_eq!(err.to_string(), "User 'missing' not found");
    }

    #[tokio::test]
    async fn test_delete_removes_user() {
        let db = create_test_db().await.unwrap();
        let repo = UserRepository::new(&db);

        let user = repo.create("ada@example.com", "Ada", "hash").await.unwrap();
        repo.delete(&user.id).await.unwrap();

        assert!(!repo.exists(&user.id).await.unwrap());
    }
}
