//! Admission and authentication middleware.

use super::{ApiError, AppState};
use crate::auth::rate_limit::RateLimiter;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

/// The authenticated caller's user id, injected by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthedUser(pub String);

/// Extract the client IP for rate-limit keying.
///
/// Proxied requests carry the original client in `X-Forwarded-For` (first
/// entry) or `X-Real-IP`; otherwise fall back to the socket peer address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        let first = xff.split(',').next().unwrap_or(xff).trim();
        if !first.is_empty() {
            return first.to_string();
        }
    }
    if let Some(xri) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let trimmed = xri.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn enforce(name: &'static str, limiter: &RateLimiter, req: Request, next: Next) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let key = client_ip(req.headers(), peer);

    if !limiter.allow(&key) {
        debug!(limiter = name, key = %key, "admission denied");
        crate::metrics::record_rate_limited(name);
        let mut response =
            ApiError::new(StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded").into_response();
        if let Ok(value) = limiter.interval().as_secs().to_string().parse() {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        return response;
    }

    next.run(req).await
}

pub async fn limit_login(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    enforce("login", &state.limiters.login, req, next).await
}

pub async fn limit_register(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    enforce("register", &state.limiters.register, req, next).await
}

pub async fn limit_general(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    enforce("general", &state.limiters.general, req, next).await
}

/// Require a valid access token and expose the caller as [`AuthedUser`].
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(token) = token else {
        return ApiError::new(StatusCode::UNAUTHORIZED, "missing bearer token").into_response();
    };

    match state.tokens.validate_access(token) {
        Ok(claims) => {
            req.extensions_mut().insert(AuthedUser(claims.user_id));
            next.run(req).await
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "10.9.9.9".parse().unwrap());
        let peer = Some("127.0.0.1:5000".parse().unwrap());

        assert_eq!(client_ip(&headers, peer), "203.0.113.7");
    }

    #[test]
    fn test_client_ip_real_ip_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", " 10.9.9.9 ".parse().unwrap());

        assert_eq!(client_ip(&headers, None), "10.9.9.9");
    }

    #[test]
    fn test_client_ip_peer_fallback() {
        let headers = HeaderMap::new();
        let peer = Some("192.0.2.4:6000".parse().unwrap());

        assert_eq!(client_ip(&headers, peer), "192.0.2.4");
        assert_eq!(client_ip(&headers, None), "unknown");
    }
}
