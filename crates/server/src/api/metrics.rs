//! `GET /metrics` — Prometheus text exposition format. Never authenticated.

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

pub async fn metrics(State(state): State<AppState>) -> Response {
    let mut out = String::new();

    out.push_str("# HELP konsul_kv_mutations_total Total KV set/delete operations.\n");
    out.push_str("# TYPE konsul_kv_mutations_total counter\n");
    out.push_str(&format!("konsul_kv_mutations_total {}\n", state.kv.mutation_count()));

    let services = state.catalog.list().await.unwrap_or_default();
    out.push_str("# HELP konsul_services_registered Services currently live in the catalog.\n");
    out.push_str("# TYPE konsul_services_registered gauge\n");
    out.push_str(&format!("konsul_services_registered {}\n", services.len()));

    out.push_str("# HELP konsul_audit_dropped_total Audit events dropped under backpressure.\n");
    out.push_str("# TYPE konsul_audit_dropped_total counter\n");
    out.push_str(&format!("konsul_audit_dropped_total {}\n", state.audit.dropped_count()));

    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], out).into_response()
}
