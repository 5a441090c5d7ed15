//! HTTP API surface.
//!
//! Thin axum handlers over the identity core. The admission middleware
//! applies the named rate limiters before any business logic runs, and
//! every domain error maps to a status code plus the standard
//! `{"error": "<message>"}` envelope.

mod handlers;
mod middleware;

pub use middleware::{AuthedUser, client_ip};

use crate::auth::jwt::TokenAuthority;
use crate::auth::rate_limit::RateLimiters;
use crate::error::{IdentityError, ReputationError, TokenError};
use crate::identity::IdentityService;
use crate::identity::invite::InviteService;
use crate::identity::reputation::ReputationService;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Shared handler state.
pub struct AppState {
    pub identity: IdentityService,
    pub invites: InviteService,
    pub reputation: ReputationService,
    pub tokens: Arc<TokenAuthority>,
    pub limiters: Arc<RateLimiters>,
    /// Access-token lifetime in seconds, echoed to clients at login.
    pub access_ttl_secs: u64,
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    let auth_routes = Router::new()
        .route(
            "/auth/login",
            post(handlers::login).layer(axum::middleware::from_fn_with_state(
                state.clone(),
                middleware::limit_login,
            )),
        )
        .route(
            "/auth/register",
            post(handlers::register).layer(axum::middleware::from_fn_with_state(
                state.clone(),
                middleware::limit_register,
            )),
        )
        .route("/auth/refresh", post(handlers::refresh))
        .route(
            "/auth/logout",
            post(handlers::logout).layer(axum::middleware::from_fn_with_state(
                state.clone(),
                middleware::require_auth,
            )),
        );

    let invite_routes = Router::new()
        .route("/invites/:code", get(handlers::check_invite))
        .route(
            "/invites",
            post(handlers::create_invite).layer(axum::middleware::from_fn_with_state(
                state.clone(),
                middleware::require_auth,
            )),
        );

    let user_routes = Router::new()
        .route(
            "/users/me",
            get(handlers::me).layer(axum::middleware::from_fn_with_state(
                state.clone(),
                middleware::require_auth,
            )),
        )
        .route("/users/:id/reputation", get(handlers::reputation));

    Router::new()
        .merge(auth_routes)
        .merge(invite_routes)
        .merge(user_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::limit_general,
        ))
        .route("/healthz", get(|| async { "ok" }))
        .route(
            "/metrics",
            get(|| async { crate::metrics::gather_metrics() }),
        )
        .with_state(state)
}

/// Serve the API until the listener fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "API listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

/// A status code plus the standard error envelope.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        let status = match &err {
            IdentityError::PasswordTooShort
            | IdentityError::PasswordTooWeak
            | IdentityError::HandleTooShort
            | IdentityError::HandleTooLong
            | IdentityError::HandleInvalidChars
            | IdentityError::InvalidEmailFormat
            | IdentityError::InvalidInviteCode
            | IdentityError::InviteExpired
            | IdentityError::InviteExhausted => StatusCode::BAD_REQUEST,
            IdentityError::EmailAlreadyRegistered | IdentityError::HandleAlreadyTaken => {
                StatusCode::CONFLICT
            }
            IdentityError::UserNotFound | IdentityError::InviteNotFound => StatusCode::NOT_FOUND,
            IdentityError::InvalidCredentials | IdentityError::Token(_) => {
                StatusCode::UNAUTHORIZED
            }
            IdentityError::Hash | IdentityError::Store(_) => {
                tracing::error!(error = %err, "identity infrastructure failure");
                return ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error");
            }
        };
        ApiError::new(status, err.to_string())
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        ApiError::new(StatusCode::UNAUTHORIZED, err.to_string())
    }
}

impl From<ReputationError> for ApiError {
    fn from(err: ReputationError) -> Self {
        let status = match &err {
            ReputationError::InvalidEventType | ReputationError::InvalidPointsValue => {
                StatusCode::BAD_REQUEST
            }
            ReputationError::DuplicateEvent => StatusCode::CONFLICT,
            ReputationError::SelfReputation => StatusCode::FORBIDDEN,
            ReputationError::Store(_) => {
                tracing::error!(error = %err, "reputation infrastructure failure");
                return ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error");
            }
        };
        ApiError::new(status, err.to_string())
    }
}
