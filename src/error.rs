//! Unified error handling for commsd.
//!
//! Every recoverable failure in the identity core is a member of a closed
//! enum, so callers can match exhaustively and the HTTP layer can map each
//! variant to a status code without string inspection. Infrastructure
//! failures (store unreachable) travel as `Store` variants wrapping the
//! database error with context, never masked as a domain sentinel.

use crate::db::DbError;
use thiserror::Error;

// ============================================================================
// Token Errors (signature, lifetime, rotation state)
// ============================================================================

/// Token validation and rotation failures.
///
/// `Validate` deliberately collapses all structural and signature failures
/// into `Invalid` so a caller probing the verifier learns nothing beyond
/// "expired" vs "bad".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("invalid token")]
    Invalid,

    #[error("token revoked")]
    Revoked,
}

impl TokenError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Expired => "token_expired",
            Self::Invalid => "token_invalid",
            Self::Revoked => "token_revoked",
        }
    }
}

// ============================================================================
// Identity Errors (registration, login, refresh)
// ============================================================================

/// Errors surfaced by the identity orchestrator.
#[derive(Debug, Error)]
pub enum IdentityError {
    // User
    #[error("user not found")]
    UserNotFound,

    #[error("email already registered")]
    EmailAlreadyRegistered,

    // Password
    #[error("password must be at least 8 characters")]
    PasswordTooShort,

    #[error("password must contain at least one letter and one number")]
    PasswordTooWeak,

    // Handle
    #[error("handle must be at least 3 characters")]
    HandleTooShort,

    #[error("handle must be 20 characters or less")]
    HandleTooLong,

    #[error("handle can only contain letters, numbers, and underscores")]
    HandleInvalidChars,

    #[error("handle already taken")]
    HandleAlreadyTaken,

    // Email
    #[error("invalid email format")]
    InvalidEmailFormat,

    // Invite
    #[error("invite not found")]
    InviteNotFound,

    #[error("invalid invite code")]
    InvalidInviteCode,

    #[error("invite has expired")]
    InviteExpired,

    #[error("invite has reached maximum uses")]
    InviteExhausted,

    // Authentication
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Token(#[from] TokenError),

    // Infrastructure
    #[error("password hashing failed")]
    Hash,

    #[error("store error: {0}")]
    Store(#[from] DbError),
}

impl IdentityError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UserNotFound => "user_not_found",
            Self::EmailAlreadyRegistered => "email_already_registered",
            Self::PasswordTooShort => "password_too_short",
            Self::PasswordTooWeak => "password_too_weak",
            Self::HandleTooShort => "handle_too_short",
            Self::HandleTooLong => "handle_too_long",
            Self::HandleInvalidChars => "handle_invalid_chars",
            Self::HandleAlreadyTaken => "handle_already_taken",
            Self::InvalidEmailFormat => "invalid_email_format",
            Self::InviteNotFound => "invite_not_found",
            Self::InvalidInviteCode => "invalid_invite_code",
            Self::InviteExpired => "invite_expired",
            Self::InviteExhausted => "invite_exhausted",
            Self::InvalidCredentials => "invalid_credentials",
            Self::Token(e) => e.error_code(),
            Self::Hash => "hash_error",
            Self::Store(_) => "store_error",
        }
    }
}

// ============================================================================
// Reputation Errors (ledger guards)
// ============================================================================

/// Errors surfaced by the reputation ledger.
#[derive(Debug, Error)]
pub enum ReputationError {
    #[error("invalid reputation event type")]
    InvalidEventType,

    #[error("invalid points value for event type")]
    InvalidPointsValue,

    #[error("reputation event already recorded")]
    DuplicateEvent,

    #[error("cannot modify own reputation")]
    SelfReputation,

    #[error("store error: {0}")]
    Store(#[from] DbError),
}

impl ReputationError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidEventType => "invalid_event_type",
            Self::InvalidPointsValue => "invalid_points_value",
            Self::DuplicateEvent => "duplicate_event",
            Self::SelfReputation => "self_reputation",
            Self::Store(_) => "store_error",
        }
    }
}
