//! # User Repository
//!
//! API login accounts. Only the authentication boundary reads these; the
//! ledger engine never sees a user row.

use apotek_core::{User, ValidationError};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};

/// Repository for user accounts.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Finds a user by username.
    pub async fn find_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = ?1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Creates a user with an argon2 hash of `password`.
    ///
    /// ## Errors
    /// `UniqueViolation` if the username is taken.
    pub async fn create(&self, username: &str, password: &str) -> DbResult<User> {
        let username = username.trim();
        for (field, value) in [("username", username), ("password", password)] {
            if value.is_empty() {
                return Err(ValidationError::Required {
                    field: field.to_string(),
                }
                .into());
            }
        }

        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| DbError::Internal(format!("Password hashing task failed: {}", e)))??;

        debug!(username = %username, "Creating user");

        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT (username) DO NOTHING \
             RETURNING id, username, password_hash, created_at",
        )
        .bind(username)
        .bind(&password_hash)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::duplicate("username", username))?;

        info!(user_id = user.id, username = %user.username, "User created");
        Ok(user)
    }

    /// Checks a username/password pair.
    ///
    /// ## Returns
    /// The user when the password matches, `None` for an unknown user or a
    /// wrong password (callers must not distinguish the two).
    pub async fn verify_credentials(&self, username: &str, password: &str) -> DbResult<Option<User>> {
        let Some(user) = self.find_by_username(username).await? else {
            debug!(username = %username, "Login for unknown user");
            return Ok(None);
        };

        // argon2 is CPU-bound; keep it off the async workers.
        let password = password.to_string();
        let hash = user.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| DbError::Internal(format!("Password check task failed: {}", e)))?;

        if matches {
            Ok(Some(user))
        } else {
            warn!(username = %username, "Password mismatch");
            Ok(None)
        }
    }

    /// Counts users (for the seeder).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Verifies a password against an argon2 PHC string.
pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Hashes a password with argon2 and a random salt.
pub fn hash_password(password: &str) -> DbResult<String> {
    use argon2::{
        password_hash::{rand_core::OsRng, SaltString},
        Argon2, PasswordHasher,
    };

    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| DbError::Internal(format!("Failed to hash password: {}", e)))?;

    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::memory_db;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("rahasia").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("rahasia", &hash));
        assert!(!verify_password("salah", &hash));
        assert!(!verify_password("rahasia", "not-a-phc-string"));
    }

    #[tokio::test]
    async fn test_create_and_verify_credentials() {
        let db = memory_db().await;
        let user = db.users().create("admin", "admin123").await.unwrap();
        assert_eq!(user.username, "admin");

        assert!(db
            .users()
            .verify_credentials("admin", "admin123")
            .await
            .unwrap()
            .is_some());
        assert!(db
            .users()
            .verify_credentials("admin", "wrong")
            .await
            .unwrap()
            .is_none());
        assert!(db
            .users()
            .verify_credentials("ghost", "admin123")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let db = memory_db().await;
        db.users().create("admin", "a").await.unwrap();
        let err = db.users().create("admin", "b").await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
        assert_eq!(db.users().count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_logins_on_blocking_pool() {
        let db = memory_db().await;
        db.users().create("admin", "admin123").await.unwrap();

        let users = db.users();
        let (a, b, c) = tokio::join!(
            users.verify_credentials("admin", "admin123"),
            users.verify_credentials("admin", "wrong"),
            users.verify_credentials("admin", "admin123"),
        );
        assert!(a.unwrap().is_some());
        assert!(b.unwrap().is_none());
        assert!(c.unwrap().is_some());
    }
}
