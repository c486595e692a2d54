use std::sync::Arc;
use std::time::Instant;

use konsul_domain::model::Identity;
use parking_lot::Mutex;
use uuid::Uuid;

/// Request-scoped values threaded through the middleware chain.
///
/// Stored in request extensions as `Arc<Mutex<RequestContext>>` rather than
/// plain `RequestContext`, since `axum::middleware::Next::run` takes the
/// request by value — a layer that runs both before and after the inner
/// chain (audit) can't re-read `req.extensions()` once it has handed the
/// request to `next.run`. Holding the `Arc` separately lets it observe
/// mutations auth/acl made deeper in the stack after the chain unwinds.
#[derive(Clone)]
pub struct SharedContext(pub Arc<Mutex<RequestContext>>);

impl SharedContext {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(RequestContext::new())))
    }

    pub fn snapshot(&self) -> RequestContext {
        self.0.lock().clone()
    }

    pub fn set_identity(&self, identity: Identity) {
        self.0.lock().identity = identity;
    }
}

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub started_at: Instant,
    pub identity: Identity,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            started_at: Instant::now(),
            identity: Identity::anonymous(),
        }
    }
}
