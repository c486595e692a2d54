mod acl;
mod audit;
mod auth;
mod catalog;
mod dns;
mod logging;
mod ratelimit;
mod server;
mod storage;

pub use acl::*;
pub use audit::*;
pub use auth::*;
pub use catalog::*;
pub use dns::*;
pub use logging::*;
pub use ratelimit::*;
pub use server::*;
pub use storage::*;

use std::fmt;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub dns: DnsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub acl: AclConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load from a TOML file, then apply `KONSUL_*` environment overrides
    /// on top. Missing file is not an error — defaults apply.
    pub fn load(path: Option<&std::path::Path>) -> crate::Result<Self> {
        let mut cfg = match path {
            Some(p) if p.exists() => {
                let text = std::fs::read_to_string(p)?;
                toml::from_str(&text)
                    .map_err(|e| crate::Error::Config(format!("parsing {}: {e}", p.display())))?
            }
            _ => Self::default(),
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// Environment variables take precedence over file and defaults. Only
    /// the handful of settings operators routinely override at the process
    /// boundary are covered here; everything else lives in the file.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("KONSUL_HTTP_PORT") {
            if let Ok(p) = v.parse() {
                self.server.http_port = p;
            }
        }
        if let Ok(v) = std::env::var("KONSUL_BIND") {
            self.server.bind = v;
        }
        if let Ok(v) = std::env::var("KONSUL_DATA_DIR") {
            self.storage.data_dir = v;
        }
        if let Ok(v) = std::env::var("KONSUL_LOG") {
            self.logging.filter = v;
        }
        if let Ok(v) = std::env::var("KONSUL_DNS_ENABLED") {
            self.dns.enabled = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Ok(v) = std::env::var("KONSUL_ACL_ENABLED") {
            self.acl.enabled = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Ok(v) = std::env::var("KONSUL_RATE_LIMIT_ENABLED") {
            self.rate_limit.enabled = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Ok(v) = std::env::var("KONSUL_AUDIT_ENABLED") {
            self.audit.enabled = v == "1" || v.eq_ignore_ascii_case("true");
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues. An empty
    /// vec means the config is usable as-is. Callers should refuse to
    /// start when any `ConfigSeverity::Error` is present.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.http_port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.http_port".into(),
                message: "port must be greater than 0".into(),
            });
        }
        if self.server.bind.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.bind".into(),
                message: "bind address must not be empty".into(),
            });
        }
        if self.server.cors.allowed_origins.len() == 1 && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)"
                    .into(),
            });
        }

        if self.storage.data_dir.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "storage.data_dir".into(),
                message: "data_dir must not be empty".into(),
            });
        }
        if !(0.0..1.0).contains(&self.storage.gc_reclaim_ratio) {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "storage.gc_reclaim_ratio".into(),
                message: "gc_reclaim_ratio must be in [0.0, 1.0)".into(),
            });
        }

        if self.catalog.default_ttl_secs <= 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "catalog.default_ttl_secs".into(),
                message: "default_ttl_secs must be greater than 0".into(),
            });
        }

        if self.dns.enabled {
            if self.dns.port == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "dns.port".into(),
                    message: "port must be greater than 0".into(),
                });
            }
            if self.dns.domain.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "dns.domain".into(),
                    message: "domain must not be empty".into(),
                });
            }
            if self.dns.port == self.server.http_port {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "dns.port".into(),
                    message: "dns.port must differ from server.http_port".into(),
                });
            }
        }

        if std::env::var(&self.auth.jwt.secret_env).is_err() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "auth.jwt.secret_env".into(),
                message: format!(
                    "environment variable \"{}\" is unset — a random secret will be generated at startup and tokens will not survive a restart",
                    self.auth.jwt.secret_env
                ),
            });
        }
        if self.auth.jwt.access_ttl_secs <= 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "auth.jwt.access_ttl_secs".into(),
                message: "access_ttl_secs must be greater than 0".into(),
            });
        }
        if self.auth.jwt.refresh_ttl_secs <= self.auth.jwt.access_ttl_secs {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "auth.jwt.refresh_ttl_secs".into(),
                message: "refresh_ttl_secs must be greater than access_ttl_secs".into(),
            });
        }

        if std::env::var(&self.auth.root.password_env).is_err() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "auth.root.password_env".into(),
                message: format!(
                    "environment variable \"{}\" is unset — POST /auth/login will always reject",
                    self.auth.root.password_env
                ),
            });
        }

        if self.rate_limit.enabled {
            if self.rate_limit.requests_per_second == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "rate_limit.requests_per_second".into(),
                    message: "requests_per_second must be greater than 0".into(),
                });
            }
            if self.rate_limit.burst_size == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "rate_limit.burst_size".into(),
                    message: "burst_size must be greater than 0".into(),
                });
            }
            for ip in &self.rate_limit.whitelist {
                if ip.parse::<std::net::IpAddr>().is_err() {
                    errors.push(ConfigError {
                        severity: ConfigSeverity::Error,
                        field: "rate_limit.whitelist".into(),
                        message: format!("\"{ip}\" is not a valid IP address"),
                    });
                }
            }
            for ip in &self.rate_limit.blacklist {
                if ip.parse::<std::net::IpAddr>().is_err() {
                    errors.push(ConfigError {
                        severity: ConfigSeverity::Error,
                        field: "rate_limit.blacklist".into(),
                        message: format!("\"{ip}\" is not a valid IP address"),
                    });
                }
            }
        }

        if self.audit.enabled && self.audit.buffer_size == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "audit.buffer_size".into(),
                message: "buffer_size must be greater than 0".into(),
            });
        }

        if self.acl.enabled
            && self.acl.default_policy != "deny"
            && self.acl.default_policy != "allow"
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "acl.default_policy".into(),
                message: format!(
                    "default_policy must be \"deny\" or \"allow\" (got \"{}\")",
                    self.acl.default_policy
                ),
            });
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_clean() {
        let cfg = Config::default();
        let errors: Vec<_> = cfg
            .validate()
            .into_iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .collect();
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn zero_port_is_an_error() {
        let mut cfg = Config::default();
        cfg.server.http_port = 0;
        let errors = cfg.validate();
        assert!(errors
            .iter()
            .any(|e| e.field == "server.http_port" && e.severity == ConfigSeverity::Error));
    }

    #[test]
    fn dns_port_colliding_with_http_port_is_rejected() {
        let mut cfg = Config::default();
        cfg.dns.enabled = true;
        cfg.dns.port = cfg.server.http_port;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "dns.port"));
    }

    #[test]
    fn refresh_ttl_must_exceed_access_ttl() {
        let mut cfg = Config::default();
        cfg.auth.jwt.access_ttl_secs = 1000;
        cfg.auth.jwt.refresh_ttl_secs = 500;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "auth.jwt.refresh_ttl_secs"));
    }

    #[test]
    fn invalid_whitelist_ip_is_rejected() {
        let mut cfg = Config::default();
        cfg.rate_limit.enabled = true;
        cfg.rate_limit.whitelist.push("not-an-ip".into());
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "rate_limit.whitelist"));
    }
}
