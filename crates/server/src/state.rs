use std::sync::Arc;

use konsul_acl::{AclEvaluator, PolicyStore};
use konsul_audit::AuditPipeline;
use konsul_auth::{ApiKeyService, JwtService};
use konsul_catalog::ServiceCatalog;
use konsul_domain::config::Config;
use konsul_dns::DnsServer;
use konsul_kv::KvStore;
use konsul_ratelimit::RateLimiter;
use konsul_storage::Engine;

/// Shared application state passed to every API handler.
///
/// Fields are grouped by concern, mirroring the component list the
/// supervisor builds in dependency order: persistence first, then the
/// stores built on top of it, then the request-scoped policy layer.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    // ── Persistence + stores ────────────────────────────────────────
    pub engine: Arc<dyn Engine>,
    pub kv: Arc<KvStore>,
    pub catalog: Arc<ServiceCatalog>,

    // ── Policy pipeline ──────────────────────────────────────────────
    pub jwt: Arc<JwtService>,
    pub api_keys: Arc<ApiKeyService>,
    pub policies: Arc<PolicyStore>,
    pub acl: Arc<AclEvaluator>,
    pub rate_limiter: Arc<RateLimiter>,
    pub audit: Arc<AuditPipeline>,

    // ── DNS ───────────────────────────────────────────────────────────
    /// `None` when `[dns].enabled = false`.
    pub dns: Option<Arc<DnsServer>>,

    // ── Admin (startup-computed) ─────────────────────────────────────
    /// SHA-256 hash of the admin bearer token. `None` = admin endpoints
    /// inaccessible until `[server.admin].token_env` is set.
    pub admin_token_hash: Option<Vec<u8>>,
}
