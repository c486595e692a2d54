pub mod auth;
pub mod backup;
pub mod health;
pub mod kv;
pub mod metrics;
pub mod services;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::middleware;
use crate::state::AppState;

/// Assembles the full HTTP surface: public routes (health, metrics,
/// login/refresh — never gated), the auth-subsystem routes that need a
/// valid identity but not a resource/capability check, and the
/// fully-gated KV/service/backup surface.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .route("/metrics", get(metrics::metrics))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh));

    let authenticated = middleware::authenticated(
        Router::new()
            .route("/auth/verify", get(auth::verify))
            .route("/auth/apikeys", post(auth::create_api_key).get(auth::list_api_keys))
            .route(
                "/auth/apikeys/:id",
                get(auth::get_api_key).delete(auth::delete_api_key),
            )
            .route("/auth/apikeys/:id/revoke", post(auth::revoke_api_key)),
        state.clone(),
    );

    let protected = middleware::protected(
        Router::new()
            .route("/kv/", get(kv::list))
            .route("/kv/*key", get(kv::get).put(kv::set).post(kv::set).delete(kv::delete))
            .route("/register", put(services::register))
            .route("/deregister/:name", delete(services::deregister))
            .route("/heartbeat/:name", put(services::heartbeat))
            .route("/services/", get(services::list))
            .route("/services/:name", get(services::get))
            .route("/backup", post(backup::create_backup))
            .route("/restore", post(backup::restore))
            .route("/export", get(backup::export))
            .route("/import", post(backup::import))
            .route("/backups", get(backup::list_backups)),
        state.clone(),
    );

    Router::new()
        .merge(public)
        .merge(authenticated)
        .merge(protected)
        .layer(axum::middleware::from_fn(middleware::error_shape::rewrite))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use konsul_acl::{AclEvaluator, PolicyStore};
    use konsul_audit::{AuditPipeline, Backpressure, Sink};
    use konsul_auth::{ApiKeyService, JwtService};
    use konsul_catalog::ServiceCatalog;
    use konsul_domain::config::Config;
    use konsul_kv::KvStore;
    use konsul_ratelimit::RateLimiter;
    use konsul_storage::{Engine, MemoryEngine};

    use super::router;
    use crate::state::AppState;

    /// Every feature this builds is disabled in the zero-value `Config`
    /// (acl, rate_limit, audit, dns all default to `enabled: false`), so the
    /// assembled router exercises the bare KV/service/health surface with no
    /// auth required — the scenarios in this module layer auth/ACL back in
    /// explicitly where they're the thing under test.
    fn test_state() -> AppState {
        let config = Arc::new(Config::default());
        let engine: Arc<dyn Engine> = Arc::new(MemoryEngine::new());
        AppState {
            kv: Arc::new(KvStore::new(engine.clone())),
            catalog: Arc::new(ServiceCatalog::new(engine.clone(), config.catalog.default_ttl_secs)),
            jwt: Arc::new(JwtService::new(b"test-secret", "konsul-test", 900, 604_800)),
            api_keys: Arc::new(ApiKeyService::new(engine.clone(), "kns")),
            policies: Arc::new(PolicyStore::new(engine.clone())),
            acl: Arc::new(AclEvaluator::new(false)),
            rate_limiter: Arc::new(RateLimiter::new(10, 20)),
            audit: Arc::new(AuditPipeline::start(Sink::stdout(), 64, Backpressure::Drop, 5)),
            dns: None,
            admin_token_hash: None,
            engine,
            config,
        }
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    }

    #[tokio::test]
    async fn kv_set_get_delete_roundtrip() {
        let app = router(test_state());

        let resp = app
            .clone()
            .oneshot(json_request("PUT", "/kv/foo", json!({"value": "bar"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app.clone().oneshot(Request::get("/kv/foo").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["key"], "foo");
        assert_eq!(body["value"], "bar");

        let resp = app
            .clone()
            .oneshot(Request::delete("/kv/foo").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app.oneshot(Request::get("/kv/foo").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn service_register_then_list_then_deregister() {
        let app = router(test_state());

        let resp = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/register",
                json!({"name": "web", "address": "10.0.0.1", "port": 8080}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app.clone().oneshot(Request::get("/services/web").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["address"], "10.0.0.1");
        assert_eq!(body["port"], 8080);

        let resp = app
            .clone()
            .oneshot(Request::delete("/deregister/web").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app.oneshot(Request::get("/services/web").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn heartbeat_on_unknown_service_is_not_found() {
        let app = router(test_state());
        let resp = app
            .oneshot(Request::put("/heartbeat/ghost").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_endpoints_are_never_gated() {
        let app = router(test_state());
        for path in ["/health", "/health/live", "/health/ready"] {
            let resp = app.clone().oneshot(Request::get(path).body(Body::empty()).unwrap()).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK, "{path}");
        }
    }

    #[tokio::test]
    async fn metrics_is_never_gated_and_reports_prometheus_text() {
        let app = router(test_state());
        let resp = app.oneshot(Request::get("/metrics").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("konsul_kv_mutations_total"));
    }

    #[tokio::test]
    async fn acl_deny_wins_over_allow_on_matching_policy() {
        let mut state = test_state();
        Arc::get_mut(&mut state.config).unwrap().acl.enabled = true;

        state
            .policies
            .add(konsul_domain::model::Policy {
                name: "app-reader".into(),
                kv: vec![
                    konsul_domain::model::AclRule {
                        pattern: "app/**".into(),
                        capabilities: vec![konsul_domain::model::Capability::Read],
                    },
                    konsul_domain::model::AclRule {
                        pattern: "app/secrets/**".into(),
                        capabilities: vec![konsul_domain::model::Capability::Deny],
                    },
                ],
                service: Vec::new(),
                health: Vec::new(),
                backup: Vec::new(),
                admin: Vec::new(),
            })
            .await
            .unwrap();

        let token = state
            .jwt
            .issue("user-1", "alice", vec!["reader".into()], vec!["app-reader".into()])
            .unwrap();

        let app = router(state);

        let resp = app
            .clone()
            .oneshot(
                Request::get("/kv/app/config/db")
                    .header("authorization", format!("Bearer {}", token.access_token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .oneshot(
                Request::get("/kv/app/secrets/pw")
                    .header("authorization", format!("Bearer {}", token.access_token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
