//! Stamps `request_id` and `path` onto JSON error bodies.
//!
//! Handlers build [`crate::error::ApiError`] without knowing the request id
//! or path ahead of time (extracting both into every handler signature
//! would be pure boilerplate), so this layer — outermost on the whole
//! router, public and protected routes alike — patches the two fields in
//! after the fact. Only touches responses whose status is an error and
//! whose body is small enough to be one of ours; anything else passes
//! through untouched.

use axum::body::{to_bytes, Body};
use axum::http::{Request, Uri};
use axum::middleware::Next;
use axum::response::Response;

use crate::middleware::context::SharedContext;

const MAX_BODY: usize = 64 * 1024;

pub async fn rewrite(req: Request<Body>, next: Next) -> Response {
    let path = req.uri().clone();
    let request_id = req
        .extensions()
        .get::<SharedContext>()
        .map(|c| c.snapshot().request_id.to_string());

    let response = next.run(req).await;
    if !response.status().is_client_error() && !response.status().is_server_error() {
        return response;
    }

    patch(response, &path, request_id.as_deref()).await
}

async fn patch(response: Response, path: &Uri, request_id: Option<&str>) -> Response {
    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_BODY).await {
        Ok(b) => b,
        Err(_) => return Response::from_parts(parts, Body::empty()),
    };

    let mut value: serde_json::Value = match serde_json::from_slice(&bytes) {
        Ok(v) => v,
        Err(_) => return Response::from_parts(parts, Body::from(bytes)),
    };

    if let Some(obj) = value.as_object_mut() {
        if obj.contains_key("error") {
            obj.entry("request_id")
                .or_insert_with(|| serde_json::Value::String(
                    request_id.unwrap_or_default().to_owned(),
                ));
            obj.insert("path".into(), serde_json::Value::String(path.path().to_owned()));
            if let Some(rid) = obj.get_mut("request_id") {
                if rid.as_str() == Some("") {
                    *rid = serde_json::Value::String(request_id.unwrap_or_default().to_owned());
                }
            }
        }
    }

    Response::from_parts(parts, Body::from(serde_json::to_vec(&value).unwrap_or(bytes.to_vec())))
}
