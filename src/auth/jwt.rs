//! Token lifecycle: issuance, validation, strongly-typed claims.
//!
//! Access and refresh tokens are HS256-signed JWTs. The verifier pins the
//! algorithm to the HMAC family, so a token whose header claims any other
//! algorithm fails signature checking outright (algorithm-confusion
//! defense). Claims are a concrete struct, not a dynamic map: a token with
//! a missing or mistyped field never reaches business logic.

use crate::config::AuthConfig;
use crate::error::TokenError;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Distinguishes the two credential lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Short-lived, proves identity for a single request window.
    Access,
    /// Longer-lived, single-use-then-rotated.
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

/// Signed token claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user this credential speaks for.
    pub user_id: String,
    /// Expiration time (Unix seconds).
    pub exp: i64,
    /// Issued at (Unix seconds).
    pub iat: i64,
    /// Not before (Unix seconds).
    pub nbf: i64,
    /// Issuer.
    pub iss: String,
    /// Audience.
    pub aud: String,
    /// Unique token id, the revocation bookkeeping handle.
    pub jti: String,
    /// "access" or "refresh".
    #[serde(default)]
    pub typ: String,
}

/// Issues and validates signed tokens. Depends only on a clock and the
/// server-held signing secret.
pub struct TokenAuthority {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenAuthority {
    pub fn new(
        secret: &[u8],
        issuer: &str,
        audience: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            access_ttl,
            refresh_ttl,
        }
    }

    /// Build from configuration; `issuer` is the server name.
    pub fn from_config(auth: &AuthConfig, issuer: &str) -> Self {
        Self::new(
            auth.token_secret.as_bytes(),
            issuer,
            &auth.audience,
            Duration::minutes(auth.access_ttl_mins as i64),
            Duration::days(auth.refresh_ttl_days as i64),
        )
    }

    /// Issue a short-lived access token.
    pub fn issue_access(&self, user_id: &str) -> Result<String, TokenError> {
        self.issue(user_id, TokenKind::Access)
    }

    /// Issue a refresh token.
    pub fn issue_refresh(&self, user_id: &str) -> Result<String, TokenError> {
        self.issue(user_id, TokenKind::Refresh)
    }

    fn issue(&self, user_id: &str, kind: TokenKind) -> Result<String, TokenError> {
        let now = Utc::now();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };

        let claims = Claims {
            user_id: user_id.to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: Uuid::new_v4().to_string(),
            typ: kind.as_str().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|_| TokenError::Invalid)
    }

    /// Parse and verify a token of either kind.
    ///
    /// Fails with [`TokenError::Expired`] when `exp` has passed and
    /// [`TokenError::Invalid`] for every other structural or signature
    /// failure; no further detail leaks to the caller.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // A token one second past exp is expired; no grace window.
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;

        if data.claims.user_id.is_empty() {
            return Err(TokenError::Invalid);
        }

        Ok(data.claims)
    }

    /// Validate a token and require it to be an access token.
    pub fn validate_access(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_kind(token, TokenKind::Access)
    }

    /// Validate a token and require it to be a refresh token.
    pub fn validate_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_kind(token, TokenKind::Refresh)
    }

    fn validate_kind(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        let claims = self.validate(token)?;
        if claims.typ != kind.as_str() {
            return Err(TokenError::Invalid);
        }
        Ok(claims)
    }
}
