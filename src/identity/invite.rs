//! Invite validation and atomic consumption.
//!
//! Invites are capability tokens gating registration into a community.
//! Checking one ([`InviteService::validate_invite`]) is a read-only
//! pre-flight; consuming one must go through the store's conditional
//! increment so two concurrent redemptions can never both take the last
//! use of a limited invite.

use crate::db::DbError;
use crate::error::IdentityError;
use async_trait::async_trait;
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::sync::Arc;

/// Invite codes are 32 alphanumeric characters drawn from the OS CSPRNG.
const INVITE_CODE_LEN: usize = 32;

/// Default invite lifetime when the creator does not pick one.
const DEFAULT_TTL_SECS: i64 = 7 * 24 * 3600;

/// An invite code row.
#[derive(Debug, Clone)]
pub struct Invite {
    pub code: String,
    pub community_id: String,
    pub creator_id: String,
    /// 0 means unlimited.
    pub max_uses: i64,
    pub used_count: i64,
    /// Unix seconds; `None` never expires.
    pub expires_at: Option<i64>,
    pub created_at: i64,
}

impl Invite {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|exp| now > exp)
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_uses > 0 && self.used_count >= self.max_uses
    }
}

/// The community an invite admits into.
#[derive(Debug, Clone)]
pub struct Community {
    pub id: String,
    pub name: String,
}

/// Creator-chosen invite parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct InviteOptions {
    /// Unix seconds; defaults to seven days out when unset.
    pub expires_at: Option<i64>,
    /// 0 means unlimited.
    pub max_uses: i64,
}

/// Invite persistence contract.
#[async_trait]
pub trait InviteStore: Send + Sync {
    async fn create(&self, invite: &Invite) -> Result<(), DbError>;
    async fn find_by_code(&self, code: &str) -> Result<Option<Invite>, DbError>;

    /// Atomically reserve one use of an invite.
    ///
    /// Must be a single conditional update (`used_count < max_uses` unless
    /// unlimited), never a read-then-write. Returns `false` when no use was
    /// available to reserve.
    async fn increment_usage(&self, code: &str) -> Result<bool, DbError>;
}

/// Community persistence contract.
#[async_trait]
pub trait CommunityStore: Send + Sync {
    async fn create(&self, community: &Community) -> Result<(), DbError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Community>, DbError>;
}

/// Standalone invite capability, independent of registration.
pub struct InviteService {
    invites: Arc<dyn InviteStore>,
    communities: Arc<dyn CommunityStore>,
}

impl InviteService {
    pub fn new(invites: Arc<dyn InviteStore>, communities: Arc<dyn CommunityStore>) -> Self {
        Self {
            invites,
            communities,
        }
    }

    /// Create and persist a new invite for a community.
    pub async fn create_invite(
        &self,
        community_id: &str,
        creator_id: &str,
        opts: InviteOptions,
    ) -> Result<Invite, IdentityError> {
        let now = chrono::Utc::now().timestamp();
        let invite = Invite {
            code: generate_invite_code(),
            community_id: community_id.to_string(),
            creator_id: creator_id.to_string(),
            max_uses: opts.max_uses,
            used_count: 0,
            expires_at: Some(opts.expires_at.unwrap_or(now + DEFAULT_TTL_SECS)),
            created_at: now,
        };
        self.invites.create(&invite).await?;
        Ok(invite)
    }

    /// Pre-flight check: is this invite still good, and for which community?
    ///
    /// Applies the same expiry and exhaustion rules as registration without
    /// consuming a use.
    pub async fn validate_invite(&self, code: &str) -> Result<Community, IdentityError> {
        let invite = self
            .invites
            .find_by_code(code)
            .await?
            .ok_or(IdentityError::InviteNotFound)?;

        let now = chrono::Utc::now().timestamp();
        if invite.is_expired(now) {
            return Err(IdentityError::InviteExpired);
        }
        if invite.is_exhausted() {
            return Err(IdentityError::InviteExhausted);
        }

        self.communities
            .find_by_id(&invite.community_id)
            .await?
            .ok_or(IdentityError::InviteNotFound)
    }

    /// Consume one use of an invite.
    pub async fn use_invite(&self, code: &str) -> Result<(), IdentityError> {
        if !self.invites.increment_usage(code).await? {
            return Err(IdentityError::InviteExhausted);
        }
        Ok(())
    }
}

/// Generate a 32-character alphanumeric invite code.
fn generate_invite_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(INVITE_CODE_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_codes_are_alphanumeric() {
        let code = generate_invite_code();
        assert_eq!(code.len(), INVITE_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_generated_codes_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..100 {
            assert!(seen.insert(generate_invite_code()));
        }
    }

    #[test]
    fn test_expiry_and_exhaustion_predicates() {
        let mut invite = Invite {
            code: "c".into(),
            community_id: "comm".into(),
            creator_id: "u".into(),
            max_uses: 2,
            used_count: 0,
            expires_at: Some(1000),
            created_at: 0,
        };
        assert!(!invite.is_expired(999));
        assert!(!invite.is_expired(1000));
        assert!(invite.is_expired(1001));

        assert!(!invite.is_exhausted());
        invite.used_count = 2;
        assert!(invite.is_exhausted());

        // Zero max_uses means unlimited.
        invite.max_uses = 0;
        invite.used_count = 10_000;
        assert!(!invite.is_exhausted());

        // No expiry timestamp means the invite never ages out.
        invite.expires_at = None;
        assert!(!invite.is_expired(i64::MAX));
    }
}
