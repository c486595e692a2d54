//! ACL middleware: infers (resource, capability) from method + path and
//! evaluates the caller's named policies against it. Applied only to
//! routes the dynamic inference table in the spec covers — health and
//! metrics are mounted outside this layer entirely, since they're never
//! authenticated and an ACL default-deny policy would otherwise make them
//! unreachable for anonymous callers.

use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use konsul_domain::model::{AclRule, Capability};

use crate::middleware::context::SharedContext;
use crate::state::AppState;

enum ResourceClass {
    Kv(String),
    Service(String),
    Backup,
    Admin,
}

/// Mirrors the route → (resource, capability) table. Returns `None` for
/// paths/methods the table doesn't recognize — those are a hard deny,
/// evaluated against no policy at all.
fn infer(method: &Method, path: &str) -> Option<(ResourceClass, Capability)> {
    let segs: Vec<&str> = path.trim_start_matches('/').split('/').collect();

    match segs.as_slice() {
        ["kv"] | ["kv", ""] => (method == Method::GET).then_some((ResourceClass::Kv(String::new()), Capability::List)),
        ["kv", key @ ..] if !key.is_empty() => {
            let key = key.join("/");
            let cap = match *method {
                Method::GET => Capability::Read,
                Method::PUT | Method::POST => Capability::Write,
                Method::DELETE => Capability::Delete,
                _ => return None,
            };
            Some((ResourceClass::Kv(key), cap))
        }
        ["register"] => Some((ResourceClass::Service(String::new()), Capability::Register)),
        ["deregister", name] => Some((ResourceClass::Service((*name).to_owned()), Capability::Deregister)),
        ["heartbeat", name] => Some((ResourceClass::Service((*name).to_owned()), Capability::Write)),
        ["services"] | ["services", ""] => {
            (method == Method::GET).then_some((ResourceClass::Service(String::new()), Capability::List))
        }
        ["services", name] => {
            (method == Method::GET).then_some((ResourceClass::Service((*name).to_owned()), Capability::Read))
        }
        ["backup"] if *method == Method::POST => Some((ResourceClass::Backup, Capability::Create)),
        ["restore"] if *method == Method::POST => Some((ResourceClass::Backup, Capability::Restore)),
        ["export"] if *method == Method::GET => Some((ResourceClass::Backup, Capability::Export)),
        ["import"] if *method == Method::POST => Some((ResourceClass::Backup, Capability::Import)),
        ["acl", ..] => {
            let cap = match *method {
                Method::GET => Capability::Read,
                _ => Capability::Write,
            };
            Some((ResourceClass::Admin, cap))
        }
        _ => None,
    }
}

pub async fn enforce(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    if !state.config.acl.enabled {
        return next.run(req).await;
    }

    let ctx = req.extensions().get::<SharedContext>().map(|c| c.snapshot());
    let identity = ctx.as_ref().map(|c| &c.identity);
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let Some((resource, capability)) = infer(&method, &path) else {
        return deny("no route matches this request");
    };

    let mut rule_lists: Vec<Vec<AclRule>> = Vec::new();
    if let Some(identity) = identity {
        for name in &identity.policies {
            if let Ok(Some(policy)) = state.policies.get(name).await {
                rule_lists.push(match &resource {
                    ResourceClass::Kv(_) => policy.kv,
                    ResourceClass::Service(_) => policy.service,
                    ResourceClass::Backup => policy.backup,
                    ResourceClass::Admin => policy.admin,
                });
            }
        }
    }

    let match_path = match &resource {
        ResourceClass::Kv(k) => format!("kv/{k}"),
        ResourceClass::Service(n) => format!("service/{n}"),
        ResourceClass::Backup => "backup".to_owned(),
        ResourceClass::Admin => "admin".to_owned(),
    };

    let allowed = state.acl.evaluate_all(
        rule_lists.iter().map(|r| r.as_slice()),
        &match_path,
        capability,
    );

    if !allowed {
        return deny("insufficient permissions");
    }

    next.run(req).await
}

fn deny(message: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(serde_json::json!({ "error": "insufficient permissions", "message": message })),
    )
        .into_response()
}
