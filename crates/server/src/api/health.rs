//! Health endpoints. Never authenticated, never ACL-checked — mounted on
//! the public router.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;

use crate::state::AppState;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn live() -> StatusCode {
    StatusCode::OK
}

/// Ready once the engine answers a trivial read. Returns 503 rather than
/// an error body — readiness probes care about the status code, not the
/// shape of the response.
pub async fn ready(State(state): State<AppState>) -> StatusCode {
    match state.kv.get("__readiness_probe__").await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
