//! Invite and community repositories.
//!
//! The invite table carries the one update in this core that must be a
//! single conditional statement: reserving a use. A read-then-write here
//! would let two concurrent redemptions both pass the "not yet exhausted"
//! check on a `max_uses = 1` invite.

use super::DbError;
use crate::identity::invite::{Community, CommunityStore, Invite, InviteStore};
use async_trait::async_trait;
use sqlx::SqlitePool;

/// SQLite-backed invite store.
#[derive(Clone)]
pub struct InviteRepository {
    pool: SqlitePool,
}

impl InviteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InviteStore for InviteRepository {
    async fn create(&self, invite: &Invite) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO invites (code, community_id, creator_id, max_uses, used_count, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&invite.code)
        .bind(&invite.community_id)
        .bind(&invite.creator_id)
        .bind(invite.max_uses)
        .bind(invite.used_count)
        .bind(invite.expires_at)
        .bind(invite.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Invite>, DbError> {
        let row = sqlx::query_as::<_, (String, String, String, i64, i64, Option<i64>, i64)>(
            r#"
            SELECT code, community_id, creator_id, max_uses, used_count, expires_at, created_at
            FROM invites
            WHERE code = ?
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(code, community_id, creator_id, max_uses, used_count, expires_at, created_at)| {
                Invite {
                    code,
                    community_id,
                    creator_id,
                    max_uses,
                    used_count,
                    expires_at,
                    created_at,
                }
            },
        ))
    }

    async fn increment_usage(&self, code: &str) -> Result<bool, DbError> {
        // Single conditional update: the check and the increment are one
        // statement, so concurrent redemptions serialize at the database
        // and at most max_uses of them match.
        let result = sqlx::query(
            r#"
            UPDATE invites
            SET used_count = used_count + 1
            WHERE code = ? AND (max_uses = 0 OR used_count < max_uses)
            "#,
        )
        .bind(code)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// SQLite-backed community store.
#[derive(Clone)]
pub struct CommunityRepository {
    pool: SqlitePool,
}

impl CommunityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommunityStore for CommunityRepository {
    async fn create(&self, community: &Community) -> Result<(), DbError> {
        sqlx::query("INSERT INTO communities (id, name, created_at) VALUES (?, ?, ?)")
            .bind(&community.id)
            .bind(&community.name)
            .bind(chrono::Utc::now().timestamp())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Community>, DbError> {
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT id, name FROM communities WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, name)| Community { id, name }))
    }
}
