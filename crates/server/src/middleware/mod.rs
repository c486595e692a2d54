pub mod acl;
pub mod audit;
pub mod auth;
pub mod context;
pub mod error_shape;
pub mod rate_limit;

use axum::middleware::from_fn_with_state;
use axum::Router;

use crate::state::AppState;

/// Attaches the request-scoped chain the protected router needs.
///
/// `.layer()` calls compose outside-in, so the *last* one added runs
/// *first* on the way in: audit is outermost — it originates the shared
/// request context and is the only layer positioned to observe the final
/// status no matter which inner layer produced it — then rate-limit, then
/// auth, then ACL, then the handler.
pub fn protected(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router
        .layer(from_fn_with_state(state.clone(), acl::enforce))
        .layer(from_fn_with_state(state.clone(), auth::populate_identity))
        .layer(from_fn_with_state(state.clone(), rate_limit::enforce))
        .layer(from_fn_with_state(state, audit::record))
}

/// Same chain minus the ACL layer, for the handful of auth-subsystem
/// routes the dynamic resource/capability table doesn't cover
/// (`/auth/verify`, `/auth/apikeys/*`) — these check their own
/// admin-ness in-handler rather than through the generic inference.
pub fn authenticated(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router
        .layer(from_fn_with_state(state.clone(), auth::populate_identity))
        .layer(from_fn_with_state(state.clone(), rate_limit::enforce))
        .layer(from_fn_with_state(state, audit::record))
}
