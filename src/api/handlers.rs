//! Request handlers for the auth, invite, and user endpoints.

use super::middleware::AuthedUser;
use super::{ApiError, AppState};
use crate::identity::invite::InviteOptions;
use crate::metrics;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub handle: String,
    pub invite_code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBody {
    pub id: String,
    pub handle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub reputation: i64,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInviteRequest {
    pub community_id: String,
    #[serde(default)]
    pub max_uses: i64,
    #[serde(default)]
    pub expires_at: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteBody {
    pub code: String,
    pub community_id: String,
    pub max_uses: i64,
    pub expires_at: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityBody {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReputationBody {
    pub user_id: String,
    pub score: i64,
    pub breakdown: Vec<ReputationEntryBody>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReputationEntryBody {
    pub event_type: String,
    pub points: i64,
    pub count: i64,
}

/// POST /auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .identity
        .register(&req.email, &req.password, &req.handle, &req.invite_code)
        .await
        .inspect_err(|e| metrics::record_auth_failed("register", e.error_code()))?;

    let access_token = state.tokens.issue_access(&user.id)?;
    let refresh_token = state.tokens.issue_refresh(&user.id)?;

    metrics::record_auth_ok("register");
    if let Some(gauge) = metrics::REGISTERED_USERS.get() {
        gauge.inc();
    }

    let body = RegisterResponse {
        access_token,
        refresh_token,
        user: UserBody {
            id: user.id,
            handle: user.handle,
            email: None,
            reputation: user.reputation,
        },
    };
    Ok((StatusCode::CREATED, Json(body)))
}

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let pair = state
        .identity
        .login(&req.email, &req.password)
        .await
        .inspect_err(|e| metrics::record_auth_failed("login", e.error_code()))?;

    metrics::record_auth_ok("login");
    Ok(Json(LoginResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        expires_in: state.access_ttl_secs,
    }))
}

/// POST /auth/refresh
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let pair = state
        .identity
        .refresh_tokens(&req.refresh_token)
        .await
        .inspect_err(|e| metrics::record_auth_failed("refresh", e.error_code()))?;

    metrics::record_auth_ok("refresh");
    Ok(Json(RefreshResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    }))
}

/// POST /auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(_caller): Extension<AuthedUser>,
    Json(req): Json<LogoutRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .identity
        .logout(&req.refresh_token)
        .await
        .inspect_err(|e| metrics::record_auth_failed("logout", e.error_code()))?;

    metrics::record_auth_ok("logout");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /invites/{code} - pre-flight invite check, no use consumed.
pub async fn check_invite(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let community = state.invites.validate_invite(&code).await?;
    Ok(Json(serde_json::json!({
        "community": CommunityBody {
            id: community.id,
            name: community.name,
        }
    })))
}

/// POST /invites
pub async fn create_invite(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthedUser>,
    Json(req): Json<CreateInviteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let invite = state
        .invites
        .create_invite(
            &req.community_id,
            &caller.0,
            InviteOptions {
                expires_at: req.expires_at,
                max_uses: req.max_uses,
            },
        )
        .await?;

    let body = InviteBody {
        code: invite.code,
        community_id: invite.community_id,
        max_uses: invite.max_uses,
        expires_at: invite.expires_at,
    };
    Ok((StatusCode::CREATED, Json(body)))
}

/// GET /users/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthedUser>,
) -> Result<Json<UserBody>, ApiError> {
    let user = state.identity.get_user(&caller.0).await?;
    Ok(Json(UserBody {
        id: user.id,
        handle: user.handle,
        email: Some(user.email),
        reputation: user.reputation,
    }))
}

/// GET /users/{id}/reputation
pub async fn reputation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ReputationBody>, ApiError> {
    let score = state.reputation.get_reputation(&id).await?;
    let breakdown = state.reputation.get_breakdown(&id).await?;

    Ok(Json(ReputationBody {
        user_id: id,
        score,
        breakdown: breakdown
            .into_iter()
            .map(|entry| ReputationEntryBody {
                event_type: entry.event_type,
                points: entry.points,
                count: entry.count,
            })
            .collect(),
    }))
}
