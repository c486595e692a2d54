//! Per-IP token-bucket rate limiting, first in the policy chain (ahead of
//! auth, so an unauthenticated flood is capped before it reaches the more
//! expensive JWT/API-key verification path).
//!
//! Access-list precedence: blacklist (always 403) → whitelist (always
//! bypass) → bucket check. See the open questions this resolves: the
//! per-identifier store here is keyed on client IP only — the
//! API-key-keyed variant the rate limiter also supports is exposed for
//! custom per-route limits but isn't wired into the default chain, since
//! the API key isn't known until the auth layer runs after this one.

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::net::SocketAddr;

use crate::state::AppState;

pub(crate) fn client_ip(req: &Request<Body>) -> String {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
    {
        let trimmed = forwarded.trim();
        if !trimmed.is_empty() {
            return trimmed.to_owned();
        }
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".into())
}

pub async fn enforce(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    if !state.config.rate_limit.enabled {
        return next.run(req).await;
    }

    let identifier = client_ip(&req);

    if state.rate_limiter.is_blacklisted(&identifier) {
        return (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({ "error": "blocked", "identifier": identifier })),
        )
            .into_response();
    }
    if state.rate_limiter.is_whitelisted(&identifier) {
        return next.run(req).await;
    }

    let decision = state.rate_limiter.check(&identifier);
    let mut response = if decision.allowed {
        next.run(req).await
    } else {
        let retry_after = decision.retry_after_secs.unwrap_or(1);
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "error": "rate_limit_exceeded",
                "identifier": identifier,
                "retry_after": retry_after,
                "reset_at": chrono::Utc::now().timestamp() + retry_after as i64,
            })),
        )
            .into_response()
    };

    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", decision.limit.into());
    headers.insert("X-RateLimit-Remaining", decision.remaining.into());
    headers.insert("X-RateLimit-Reset", decision.reset_after_secs.into());
    if let Some(retry_after) = decision.retry_after_secs {
        headers.insert("Retry-After", retry_after.into());
    }
    response
}
