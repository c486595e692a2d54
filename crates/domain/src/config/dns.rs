use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "d_bind")]
    pub bind: String,
    #[serde(default = "d_port")]
    pub port: u16,
    /// DNS domain suffix, e.g. "consul" for `<service>.service.consul.`.
    #[serde(default = "d_domain")]
    pub domain: String,
    #[serde(default = "d_ttl_secs")]
    pub record_ttl_secs: u32,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: d_bind(),
            port: d_port(),
            domain: d_domain(),
            record_ttl_secs: d_ttl_secs(),
        }
    }
}

fn d_bind() -> String {
    "0.0.0.0".into()
}
fn d_port() -> u16 {
    8600
}
fn d_domain() -> String {
    "consul".into()
}
fn d_ttl_secs() -> u32 {
    5
}
