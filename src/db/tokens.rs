//! Refresh-token revocation repository.
//!
//! Stores a SHA-256 digest of each revoked token, never the credential
//! itself: a leaked table must not be replayable. The table only ever
//! grows by explicit revocations (logout, rotation); entries for tokens
//! past their seven-day lifetime are pruned by the maintenance task.

use super::DbError;
use crate::identity::RevocationStore;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

/// SQLite-backed revocation store.
#[derive(Clone)]
pub struct RevocationRepository {
    pool: SqlitePool,
}

impl RevocationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Drop revocations older than `max_age_secs`.
    ///
    /// A revocation only matters while the token it kills could still
    /// verify; anything older than the refresh lifetime is dead weight.
    pub async fn prune(&self, max_age_secs: i64) -> Result<u64, DbError> {
        let cutoff = chrono::Utc::now().timestamp() - max_age_secs;
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE revoked_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn digest(token: &str) -> String {
    let hash = Sha256::digest(token.as_bytes());
    format!("{hash:x}")
}

#[async_trait]
impl RevocationStore for RevocationRepository {
    async fn is_revoked(&self, token: &str) -> Result<bool, DbError> {
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT 1 FROM revoked_tokens WHERE token_digest = ?",
        )
        .bind(digest(token))
        .fetch_optional(&self.pool)
        .await?;

        Ok(found.is_some())
    }

    async fn revoke(&self, token: &str) -> Result<(), DbError> {
        // Revoking twice is idempotent.
        sqlx::query(
            r#"
            INSERT INTO revoked_tokens (token_digest, revoked_at)
            VALUES (?, ?)
            ON CONFLICT (token_digest) DO NOTHING
            "#,
        )
        .bind(digest(token))
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
