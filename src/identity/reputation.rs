//! Append-only reputation ledger with anti-gaming guards.
//!
//! Every reputation change is an immutable event; a user's score is the sum
//! over their events and is never decayed or recomputed destructively. Three
//! guards keep the ledger honest: callers cannot award themselves points,
//! each event type carries a closed points range, and a non-empty reference
//! id is credited at most once per (user, event type).

use crate::db::DbError;
use crate::error::ReputationError;
use async_trait::async_trait;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// The closed set of reputation-affecting event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    MessagePosted,
    MessageUpvoted,
    MessageDownvoted,
    InviteUsed,
    ReportedAbuse,
    ModeratorAction,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::MessagePosted,
        EventKind::MessageUpvoted,
        EventKind::MessageDownvoted,
        EventKind::InviteUsed,
        EventKind::ReportedAbuse,
        EventKind::ModeratorAction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MessagePosted => "message_posted",
            Self::MessageUpvoted => "message_upvoted",
            Self::MessageDownvoted => "message_downvoted",
            Self::InviteUsed => "invite_used",
            Self::ReportedAbuse => "reported_abuse",
            Self::ModeratorAction => "moderator_action",
        }
    }

    /// The allowed points range for this event type. A caller cannot award
    /// arbitrary amounts under a legitimate-looking type.
    pub fn point_range(&self) -> RangeInclusive<i64> {
        match self {
            Self::MessagePosted => 1..=5,
            Self::MessageUpvoted => 1..=10,
            Self::MessageDownvoted => -10..=-1,
            Self::InviteUsed => 5..=20,
            Self::ReportedAbuse => -50..=-10,
            Self::ModeratorAction => -100..=100,
        }
    }
}

impl FromStr for EventKind {
    type Err = ReputationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or(ReputationError::InvalidEventType)
    }
}

/// A single ledger entry.
#[derive(Debug, Clone)]
pub struct ReputationEvent {
    pub id: String,
    pub user_id: String,
    pub event_type: EventKind,
    pub points: i64,
    /// Idempotence key (message id, report id). Empty means "no key".
    pub ref_id: String,
    pub created_at: i64,
}

/// One row of a per-type score breakdown.
#[derive(Debug, Clone)]
pub struct ReputationEntry {
    pub event_type: String,
    pub points: i64,
    pub count: i64,
}

/// Ledger persistence contract.
///
/// `record_event` must enforce the `(user, event_type, ref_id)` uniqueness
/// atomically with the append, surfacing a duplicate as
/// [`DbError::DuplicateEvent`]; the service's pre-check alone would race.
#[async_trait]
pub trait ReputationStore: Send + Sync {
    async fn get_reputation(&self, user_id: &str) -> Result<i64, DbError>;
    async fn record_event(&self, event: &ReputationEvent) -> Result<(), DbError>;
    async fn has_recorded_event(
        &self,
        user_id: &str,
        event_type: &str,
        ref_id: &str,
    ) -> Result<bool, DbError>;
    async fn get_breakdown(&self, user_id: &str) -> Result<Vec<ReputationEntry>, DbError>;
}

/// Reputation ledger front-end.
pub struct ReputationService {
    store: Arc<dyn ReputationStore>,
}

impl ReputationService {
    pub fn new(store: Arc<dyn ReputationStore>) -> Self {
        Self { store }
    }

    /// Current aggregate score for a user. Unknown users score zero.
    pub async fn get_reputation(&self, user_id: &str) -> Result<i64, ReputationError> {
        Ok(self.store.get_reputation(user_id).await?)
    }

    /// Per-event-type score breakdown.
    pub async fn get_breakdown(
        &self,
        user_id: &str,
    ) -> Result<Vec<ReputationEntry>, ReputationError> {
        Ok(self.store.get_breakdown(user_id).await?)
    }

    /// Record a reputation event against `target_id` on behalf of
    /// `caller_id`.
    ///
    /// Self-awarded reputation is rejected for every type except
    /// `moderator_action` (a moderator sanctioning or compensating their own
    /// account is a deliberate, audited act).
    pub async fn record_event(
        &self,
        caller_id: &str,
        target_id: &str,
        event_type: &str,
        points: i64,
        ref_id: &str,
    ) -> Result<(), ReputationError> {
        let kind = EventKind::from_str(event_type)?;

        if caller_id == target_id && kind != EventKind::ModeratorAction {
            return Err(ReputationError::SelfReputation);
        }

        if !kind.point_range().contains(&points) {
            return Err(ReputationError::InvalidPointsValue);
        }

        if !ref_id.is_empty()
            && self
                .store
                .has_recorded_event(target_id, kind.as_str(), ref_id)
                .await?
        {
            return Err(ReputationError::DuplicateEvent);
        }

        let event = ReputationEvent {
            id: Uuid::new_v4().to_string(),
            user_id: target_id.to_string(),
            event_type: kind,
            points,
            ref_id: ref_id.to_string(),
            created_at: chrono::Utc::now().timestamp(),
        };

        // The store re-checks uniqueness inside the append; two identical
        // events racing past the check above cannot both land.
        match self.store.record_event(&event).await {
            Ok(()) => {
                crate::metrics::record_reputation_event(kind.as_str());
                Ok(())
            }
            Err(DbError::DuplicateEvent) => Err(ReputationError::DuplicateEvent),
            Err(e) => Err(ReputationError::Store(e)),
        }
    }
}
