//! Audit middleware: records one event per request that reached a handler,
//! after the response is known.
//!
//! This layer also originates the request's [`SharedContext`] — it has to,
//! since it's the outermost layer and `axum::middleware::Next::run` takes
//! the request by value: to inspect anything inner layers mutated (the
//! identity auth sets, the final status) after the chain unwinds, this
//! layer must keep its own clone of the shared cell from before handing
//! the request onward.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use std::collections::HashMap;

use konsul_domain::model::{AuditActor, AuditEvent, AuditHttp, AuditResource, AuditResult};

use crate::middleware::context::SharedContext;
use crate::middleware::rate_limit::client_ip;
use crate::state::AppState;

pub async fn record(State(state): State<AppState>, mut req: Request<Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_owned();
    let ip = client_ip(&req);

    let ctx = SharedContext::new();
    req.extensions_mut().insert(ctx.clone());

    let response = next.run(req).await;

    if !state.config.audit.enabled {
        return response;
    }

    let snapshot = ctx.snapshot();
    let status = response.status().as_u16();
    let result = if status < 400 {
        AuditResult::Success
    } else if status == 401 || status == 403 {
        AuditResult::Denied
    } else {
        AuditResult::Error
    };

    let event = AuditEvent {
        id: uuid::Uuid::nil(),
        ts: None,
        action: format!("{method} {path}"),
        result,
        resource: AuditResource {
            kind: "http".into(),
            id: path.clone(),
            namespace: None,
        },
        actor: AuditActor {
            id: snapshot.identity.id,
            kind: snapshot.identity.actor_type,
            name: snapshot.identity.name,
            roles: (!snapshot.identity.roles.is_empty()).then_some(snapshot.identity.roles),
            token_id: snapshot.identity.token_id,
        },
        source_ip: ip,
        auth_method: snapshot.identity.auth_method.to_owned(),
        http: AuditHttp { method, path, status },
        trace_id: Some(snapshot.request_id.to_string()),
        span_id: None,
        request_hash: None,
        metadata: HashMap::from([(
            "latency_ms".to_owned(),
            snapshot.started_at.elapsed().as_millis().to_string(),
        )]),
    };

    state.audit.record(event).await;
    response
}
