//! User repository.

use super::DbError;
use crate::identity::{User, UserStore};
use async_trait::async_trait;
use sqlx::SqlitePool;

/// SQLite-backed user store.
#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Total registered users, for the startup gauge.
    pub async fn count(&self) -> Result<i64, DbError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn find_where(&self, clause: &str, value: &str) -> Result<Option<User>, DbError> {
        let sql = format!(
            "SELECT id, email, handle, password_hash, reputation, created_at \
             FROM users WHERE {clause}"
        );
        let row = sqlx::query_as::<_, (String, String, String, String, i64, i64)>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(
            |(id, email, handle, password_hash, reputation, created_at)| User {
                id,
                email,
                handle,
                password_hash,
                reputation,
                created_at,
            },
        ))
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn create(&self, user: &User) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, handle, password_hash, reputation, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.handle)
        .bind(&user.password_hash)
        .bind(user.reputation)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            // The UNIQUE constraints are the race-safe backstop behind the
            // service's pre-checks; name the offending column.
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                if db_err.message().contains("users.email") {
                    return DbError::EmailExists(user.email.clone());
                }
                return DbError::HandleExists(user.handle.clone());
            }
            DbError::from(e)
        })?;

        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        self.find_where("email = ? COLLATE NOCASE", email).await
    }

    async fn find_by_handle(&self, handle: &str) -> Result<Option<User>, DbError> {
        self.find_where("handle = ? COLLATE NOCASE", handle).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, DbError> {
        self.find_where("id = ?", id).await
    }
}
