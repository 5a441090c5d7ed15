//! Reputation ledger repository.
//!
//! Events are append-only; nothing here updates or deletes a ledger row.
//! The partial unique index on `(user_id, event_type, ref_id)` makes the
//! duplicate check atomic with the append, which the service's pre-check
//! alone cannot be.

use super::DbError;
use crate::identity::reputation::{ReputationEntry, ReputationEvent, ReputationStore};
use async_trait::async_trait;
use sqlx::SqlitePool;

/// SQLite-backed reputation store.
#[derive(Clone)]
pub struct ReputationRepository {
    pool: SqlitePool,
}

impl ReputationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReputationStore for ReputationRepository {
    async fn get_reputation(&self, user_id: &str) -> Result<i64, DbError> {
        let score = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(points), 0) FROM reputation_events WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(score)
    }

    async fn record_event(&self, event: &ReputationEvent) -> Result<(), DbError> {
        // Append the event and fold its points into the denormalized user
        // score in one transaction, so the two can never drift.
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO reputation_events (id, user_id, event_type, points, ref_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&event.id)
        .bind(&event.user_id)
        .bind(event.event_type.as_str())
        .bind(event.points)
        .bind(&event.ref_id)
        .bind(event.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return DbError::DuplicateEvent;
            }
            DbError::from(e)
        })?;

        sqlx::query("UPDATE users SET reputation = reputation + ? WHERE id = ?")
            .bind(event.points)
            .bind(&event.user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn has_recorded_event(
        &self,
        user_id: &str,
        event_type: &str,
        ref_id: &str,
    ) -> Result<bool, DbError> {
        let found = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT 1 FROM reputation_events
            WHERE user_id = ? AND event_type = ? AND ref_id = ?
            "#,
        )
        .bind(user_id)
        .bind(event_type)
        .bind(ref_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(found.is_some())
    }

    async fn get_breakdown(&self, user_id: &str) -> Result<Vec<ReputationEntry>, DbError> {
        let rows = sqlx::query_as::<_, (String, i64, i64)>(
            r#"
            SELECT event_type, SUM(points), COUNT(*)
            FROM reputation_events
            WHERE user_id = ?
            GROUP BY event_type
            ORDER BY event_type
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(event_type, points, count)| ReputationEntry {
                event_type,
                points,
                count,
            })
            .collect())
    }
}
