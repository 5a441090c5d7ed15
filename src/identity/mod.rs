//! Identity orchestration: registration, login, and token refresh.
//!
//! The [`IdentityService`] composes the invite validator, password hasher,
//! token authority, and the user/revocation stores. It is the integration
//! point everything else (HTTP handlers, transport auth) consumes; the
//! stores themselves are trait objects so tests and alternative backends
//! can swap the SQLite repositories out.

pub mod invite;
pub mod reputation;

use crate::auth::jwt::TokenAuthority;
use crate::auth::password::PasswordHasher;
use crate::db::DbError;
use crate::error::{IdentityError, TokenError};
use async_trait::async_trait;
use invite::InviteStore;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{info, warn};
use uuid::Uuid;

static HANDLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").expect("handle regex"));
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email regex")
});

/// Fixed input for the digest compared against when login hits an unknown
/// email. Burning a real verification keeps the two failure paths on the
/// same clock.
const DUMMY_PASSWORD: &str = "timing-equalizer";

/// A registered user.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub handle: String,
    pub password_hash: String,
    pub reputation: i64,
    pub created_at: i64,
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// User persistence contract.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: &User) -> Result<(), DbError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DbError>;
    async fn find_by_handle(&self, handle: &str) -> Result<Option<User>, DbError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, DbError>;
}

/// Refresh-token revocation contract.
///
/// The store answers "is this presented token dead?"; signature and expiry
/// checks stay with the token authority. Implementations must never persist
/// the raw credential.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    async fn is_revoked(&self, token: &str) -> Result<bool, DbError>;
    async fn revoke(&self, token: &str) -> Result<(), DbError>;
}

/// Identity orchestrator.
pub struct IdentityService {
    users: Arc<dyn UserStore>,
    invites: Arc<dyn InviteStore>,
    hasher: Arc<dyn PasswordHasher>,
    tokens: Arc<TokenAuthority>,
    revoked: Arc<dyn RevocationStore>,
    /// Digest verified against when the email lookup misses.
    dummy_digest: String,
}

impl IdentityService {
    pub fn new(
        users: Arc<dyn UserStore>,
        invites: Arc<dyn InviteStore>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<TokenAuthority>,
        revoked: Arc<dyn RevocationStore>,
    ) -> Self {
        let dummy_digest = hasher
            .hash(DUMMY_PASSWORD)
            .expect("hashing a fixed password cannot fail");
        Self {
            users,
            invites,
            hasher,
            tokens,
            revoked,
            dummy_digest,
        }
    }

    /// Register a new user through an invite code.
    ///
    /// Validation runs cheapest-first and reveals nothing about existing
    /// accounts until the invite itself has been accepted. The invite use is
    /// *reserved* with an atomic conditional increment before the user row
    /// is written, so concurrent redemptions of a limited invite can never
    /// over-admit; a crash between reservation and user creation leaks one
    /// use, which is the accepted failure mode.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        handle: &str,
        invite_code: &str,
    ) -> Result<User, IdentityError> {
        let invite = self
            .invites
            .find_by_code(invite_code)
            .await?
            .ok_or(IdentityError::InvalidInviteCode)?;

        let now = chrono::Utc::now().timestamp();
        if invite.is_expired(now) {
            return Err(IdentityError::InviteExpired);
        }
        if invite.is_exhausted() {
            return Err(IdentityError::InviteExhausted);
        }

        validate_email(email)?;
        validate_password(password)?;
        validate_handle(handle)?;

        if self.users.find_by_email(email).await?.is_some() {
            return Err(IdentityError::EmailAlreadyRegistered);
        }
        if self.users.find_by_handle(handle).await?.is_some() {
            return Err(IdentityError::HandleAlreadyTaken);
        }

        let password_hash = self
            .hasher
            .hash(password)
            .map_err(|_| IdentityError::Hash)?;

        // Reserve the invite use. Losing the conditional update here means
        // another registration consumed the last slot between our read check
        // and now.
        if !self.invites.increment_usage(invite_code).await? {
            return Err(IdentityError::InviteExhausted);
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            handle: handle.to_string(),
            password_hash,
            reputation: 0,
            created_at: now,
        };

        if let Err(e) = self.users.create(&user).await {
            // The reserved use is not returned; an invite slot lost to an
            // infrastructure failure is preferable to over-admission.
            warn!(code = %invite_code, error = %e, "user creation failed after invite reservation");
            return Err(match e {
                DbError::EmailExists(_) => IdentityError::EmailAlreadyRegistered,
                DbError::HandleExists(_) => IdentityError::HandleAlreadyTaken,
                other => IdentityError::Store(other),
            });
        }

        info!(user = %user.handle, community = %invite.community_id, "user registered");
        Ok(user)
    }

    /// Authenticate by email and password, issuing a fresh token pair.
    ///
    /// An unknown email still pays for a full digest verification against a
    /// fixed dummy hash, so response latency cannot be used to enumerate
    /// registered addresses. Both failure modes collapse into
    /// `InvalidCredentials`.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, IdentityError> {
        let user = match self.users.find_by_email(email).await? {
            Some(user) => user,
            None => {
                let _ = self.hasher.verify(&self.dummy_digest, password);
                return Err(IdentityError::InvalidCredentials);
            }
        };

        if self.hasher.verify(&user.password_hash, password).is_err() {
            return Err(IdentityError::InvalidCredentials);
        }

        self.issue_pair(&user.id).map_err(IdentityError::from)
    }

    /// Rotate a refresh token: validate, check revocation, revoke, reissue.
    ///
    /// Refresh tokens are single-use. The presented token is revoked before
    /// the new pair is issued; if issuance then fails the caller is forced
    /// back to login rather than left holding two live refresh tokens.
    pub async fn refresh_tokens(
        &self,
        refresh_token: &str,
    ) -> Result<AuthResponse, IdentityError> {
        let claims = self.tokens.validate_refresh(refresh_token)?;

        if self.revoked.is_revoked(refresh_token).await? {
            return Err(TokenError::Revoked.into());
        }

        self.revoked.revoke(refresh_token).await?;

        self.issue_pair(&claims.user_id).map_err(IdentityError::from)
    }

    /// Revoke a refresh token at logout.
    ///
    /// An already-expired token is a no-op success: it can never be
    /// presented again, so there is nothing to record.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), IdentityError> {
        match self.tokens.validate_refresh(refresh_token) {
            Ok(_) => {}
            Err(TokenError::Expired) => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        self.revoked.revoke(refresh_token).await?;
        Ok(())
    }

    /// Look up a user by id.
    pub async fn get_user(&self, user_id: &str) -> Result<User, IdentityError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(IdentityError::UserNotFound)
    }

    fn issue_pair(&self, user_id: &str) -> Result<AuthResponse, TokenError> {
        let access_token = self.tokens.issue_access(user_id)?;
        let refresh_token = self.tokens.issue_refresh(user_id)?;
        Ok(AuthResponse {
            access_token,
            refresh_token,
        })
    }
}

fn validate_email(email: &str) -> Result<(), IdentityError> {
    if !EMAIL_RE.is_match(email) {
        return Err(IdentityError::InvalidEmailFormat);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), IdentityError> {
    if password.len() < 8 {
        return Err(IdentityError::PasswordTooShort);
    }
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit {
        return Err(IdentityError::PasswordTooWeak);
    }
    Ok(())
}

fn validate_handle(handle: &str) -> Result<(), IdentityError> {
    if handle.len() < 3 {
        return Err(IdentityError::HandleTooShort);
    }
    if handle.len() > 20 {
        return Err(IdentityError::HandleTooLong);
    }
    if !HANDLE_RE.is_match(handle) {
        return Err(IdentityError::HandleInvalidChars);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_handle() {
        assert!(validate_handle("alice_99").is_ok());
        assert!(validate_handle("abc").is_ok());
        assert!(matches!(
            validate_handle("ab"),
            Err(IdentityError::HandleTooShort)
        ));
        assert!(matches!(
            validate_handle("a".repeat(21).as_str()),
            Err(IdentityError::HandleTooLong)
        ));
        assert!(matches!(
            validate_handle("has space"),
            Err(IdentityError::HandleInvalidChars)
        ));
        assert!(matches!(
            validate_handle("dash-ed"),
            Err(IdentityError::HandleInvalidChars)
        ));
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("passw0rd").is_ok());
        assert!(matches!(
            validate_password("short1"),
            Err(IdentityError::PasswordTooShort)
        ));
        assert!(matches!(
            validate_password("allletters"),
            Err(IdentityError::PasswordTooWeak)
        ));
        assert!(matches!(
            validate_password("1234567890"),
            Err(IdentityError::PasswordTooWeak)
        ));
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("first.last+tag@sub.domain.org").is_ok());
        for bad in ["", "plain", "missing@tld", "@nodomain.com", "spaces in@x.com"] {
            assert!(
                matches!(validate_email(bad), Err(IdentityError::InvalidEmailFormat)),
                "expected {bad:?} to be rejected"
            );
        }
    }
}
