use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub jwt: JwtConfig,
    #[serde(default)]
    pub api_key: ApiKeyConfig,
    #[serde(default)]
    pub root: RootConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt: JwtConfig::default(),
            api_key: ApiKeyConfig::default(),
            root: RootConfig::default(),
        }
    }
}

/// The single bootstrap account `/auth/login` authenticates against.
/// There is no user store in this system — identity beyond the root
/// account and API keys is out of scope (see Non-goals).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootConfig {
    #[serde(default = "d_root_username")]
    pub username: String,
    /// Environment variable holding the root password. Unset means
    /// `/auth/login` always rejects (API keys remain usable).
    #[serde(default = "d_root_password_env")]
    pub password_env: String,
    #[serde(default = "d_root_roles")]
    pub roles: Vec<String>,
    #[serde(default = "d_root_policies")]
    pub policies: Vec<String>,
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            username: d_root_username(),
            password_env: d_root_password_env(),
            roles: d_root_roles(),
            policies: d_root_policies(),
        }
    }
}

fn d_root_username() -> String {
    "admin".into()
}
fn d_root_password_env() -> String {
    "KONSUL_ROOT_PASSWORD".into()
}
fn d_root_roles() -> Vec<String> {
    vec!["admin".into()]
}
fn d_root_policies() -> Vec<String> {
    vec!["admin".into()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Environment variable holding the HMAC signing secret.
    #[serde(default = "d_secret_env")]
    pub secret_env: String,
    #[serde(default = "d_issuer")]
    pub issuer: String,
    #[serde(default = "d_access_ttl_secs")]
    pub access_ttl_secs: i64,
    #[serde(default = "d_refresh_ttl_secs")]
    pub refresh_ttl_secs: i64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret_env: d_secret_env(),
            issuer: d_issuer(),
            access_ttl_secs: d_access_ttl_secs(),
            refresh_ttl_secs: d_refresh_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyConfig {
    #[serde(default = "d_key_prefix")]
    pub key_prefix: String,
}

impl Default for ApiKeyConfig {
    fn default() -> Self {
        Self {
            key_prefix: d_key_prefix(),
        }
    }
}

fn d_secret_env() -> String {
    "KONSUL_JWT_SECRET".into()
}
fn d_issuer() -> String {
    "konsul".into()
}
fn d_access_ttl_secs() -> i64 {
    900
}
fn d_refresh_ttl_secs() -> i64 {
    604_800
}
fn d_key_prefix() -> String {
    "kns".into()
}
