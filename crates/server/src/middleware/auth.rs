//! Authentication middleware: populates the request's [`SharedContext`]
//! with an [`Identity`] derived from the `Authorization` header.
//!
//! Three forms share the one header: the bootstrap admin bearer token
//! (`[server.admin].token_env`, constant-time compared against its stored
//! hash — the same pattern the admin guard uses), a JWT, or an API key. A
//! bearer value that isn't the admin token is tried as a JWT first; if it
//! doesn't parse as one (rather than merely failing validation), it's
//! tried as an API key. Neither present leaves the identity anonymous —
//! whether that's acceptable is the ACL layer's call, not this one's.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use konsul_domain::model::{ActorType, Identity};

use crate::error::ApiError;
use crate::middleware::context::SharedContext;
use crate::state::AppState;

fn bearer_token(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn is_admin_token(state: &AppState, token: &str) -> bool {
    let Some(expected) = &state.admin_token_hash else {
        return false;
    };
    let got = Sha256::digest(token.as_bytes());
    bool::from(got.as_slice().ct_eq(expected))
}

pub async fn populate_identity(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(ctx) = req.extensions().get::<SharedContext>().cloned() else {
        return next.run(req).await;
    };

    if let Some(token) = bearer_token(&req) {
        if is_admin_token(&state, token) {
            ctx.set_identity(Identity {
                actor_type: ActorType::User,
                id: "root".into(),
                name: Some(state.config.auth.root.username.clone()),
                roles: vec!["admin".into()],
                policies: vec!["admin".into()],
                token_id: None,
                auth_method: "admin_token",
            });
        } else if looks_like_api_key(token) {
            match state.api_keys.verify(token).await {
                Ok(record) => {
                    ctx.set_identity(Identity {
                        actor_type: ActorType::ApiKey,
                        id: record.id.to_string(),
                        name: Some(record.name.clone()),
                        roles: Vec::new(),
                        policies: record.permissions.clone(),
                        token_id: Some(record.id.to_string()),
                        auth_method: "api_key",
                    });
                }
                Err(_) => {
                    return ApiError::unauthorized("invalid API key").into_response();
                }
            }
        } else {
            match state.jwt.verify_access(token) {
                Ok(claims) => {
                    ctx.set_identity(Identity {
                        actor_type: ActorType::User,
                        id: claims.sub.clone(),
                        name: Some(claims.username.clone()),
                        roles: claims.roles,
                        policies: claims.policies,
                        token_id: None,
                        auth_method: "jwt",
                    });
                }
                Err(e) => {
                    return ApiError::unauthorized(jwt_error_message(&e)).into_response();
                }
            }
        }
    }

    next.run(req).await
}

fn looks_like_api_key(token: &str) -> bool {
    // JWTs are three base64url segments joined by dots; our API keys are
    // `<prefix>_<64 hex chars>` and never contain a dot.
    !token.contains('.')
}

fn jwt_error_message(e: &konsul_auth::AuthError) -> String {
    use konsul_auth::AuthError::*;
    match e {
        TokenMissing => "missing authorization header".into(),
        TokenExpired => "token expired".into(),
        TokenInvalid(_) => "invalid token".into(),
        other => other.to_string(),
    }
}
