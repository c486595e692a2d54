//! Shared data-model types for the KV store, service catalog, ACL, auth, and
//! audit subsystems. These are the wire/storage shapes every crate in the
//! workspace agrees on.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// KV store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A single KV entry as stored and returned by the KV API. `version`
/// increments on every `Set` to the same key and backs optimistic
/// concurrency checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvEntry {
    pub key: String,
    pub value: Vec<u8>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Service catalog
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A registered service endpoint. Immutable apart from the heartbeat that
/// lives alongside it in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub address: String,
    pub port: u16,
}

/// A catalog entry: the immutable service tuple plus its mutable liveness
/// timestamp. `last_heartbeat` is advanced by `Register`/`Heartbeat` and is
/// the sole input to the TTL liveness check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEntry {
    #[serde(flatten)]
    pub service: Service,
    pub last_heartbeat: DateTime<Utc>,
}

impl ServiceEntry {
    pub fn is_live(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.last_heartbeat) < ttl
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ACL
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A discrete authorization verb attached to an ACL rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Read,
    Write,
    List,
    Delete,
    Deny,
    Register,
    Deregister,
    Create,
    Restore,
    Export,
    Import,
    Admin,
}

/// One of the resource classes an ACL rule or capability check applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Resource {
    Kv(String),
    Service(String),
    Health,
    Backup,
    Admin,
}

/// A single ACL rule: a pattern (for KV/Service rules) plus the capabilities
/// it grants (or denies, via `Capability::Deny`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AclRule {
    /// Path or service-name pattern. Ignored for Health/Backup/Admin rules.
    #[serde(default)]
    pub pattern: String,
    pub capabilities: Vec<Capability>,
}

/// A named ACL policy: one rule list per resource class.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Policy {
    pub name: String,
    #[serde(default)]
    pub kv: Vec<AclRule>,
    #[serde(default)]
    pub service: Vec<AclRule>,
    #[serde(default)]
    pub health: Vec<AclRule>,
    #[serde(default)]
    pub backup: Vec<AclRule>,
    #[serde(default)]
    pub admin: Vec<AclRule>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Auth: API keys
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A stored API key record. The raw key string is never persisted — only
/// its SHA-256 hash (`stored_hash`, hex-encoded).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub id: Uuid,
    pub name: String,
    pub stored_hash: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    pub enabled: bool,
}

impl ApiKeyRecord {
    pub fn has_permission(&self, perm: &str) -> bool {
        self.permissions.iter().any(|p| p == perm || p == "*")
    }
}

/// [`ApiKeyRecord`] with the hash stripped, as returned by list/get endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyPublic {
    pub id: Uuid,
    pub name: String,
    pub permissions: Vec<String>,
    pub metadata: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    pub enabled: bool,
}

impl From<&ApiKeyRecord> for ApiKeyPublic {
    fn from(r: &ApiKeyRecord) -> Self {
        Self {
            id: r.id,
            name: r.name.clone(),
            permissions: r.permissions.clone(),
            metadata: r.metadata.clone(),
            created_at: r.created_at,
            expires_at: r.expires_at,
            last_used_at: r.last_used_at,
            enabled: r.enabled,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Auth: JWT claims
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Access-token claim set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub username: String,
    pub roles: Vec<String>,
    pub policies: Vec<String>,
    pub iss: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

/// Refresh-token claim set — deliberately thin, carries no roles/policies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub exp: i64,
}

/// The request-scoped identity produced by the auth middleware and consumed
/// by the ACL layer and the audit pipeline.
#[derive(Debug, Clone)]
pub struct Identity {
    pub actor_type: ActorType,
    pub id: String,
    pub name: Option<String>,
    pub roles: Vec<String>,
    pub policies: Vec<String>,
    pub token_id: Option<String>,
    pub auth_method: &'static str,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            actor_type: ActorType::Anonymous,
            id: "anonymous".into(),
            name: None,
            roles: Vec::new(),
            policies: Vec::new(),
            token_id: None,
            auth_method: "none",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    Anonymous,
    User,
    ApiKey,
    Service,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Audit
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditResult {
    Success,
    Denied,
    Error,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditResource {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditActor {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActorType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditHttp {
    pub method: String,
    pub path: String,
    pub status: u16,
}

/// A single audit record. `Record()` fills in `id`/`ts`/`metadata` when the
/// caller leaves them blank, so most fields are constructed eagerly and the
/// rest are defaulted at submission time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    #[serde(default = "Uuid::nil")]
    pub id: Uuid,
    #[serde(default)]
    pub ts: Option<DateTime<Utc>>,
    pub action: String,
    pub result: AuditResult,
    pub resource: AuditResource,
    pub actor: AuditActor,
    pub source_ip: String,
    pub auth_method: String,
    pub http: AuditHttp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_hash: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}
