use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Seconds since last heartbeat after which a service is considered dead.
    #[serde(default = "d_ttl_secs")]
    pub default_ttl_secs: i64,
    /// How often the expiry sweep runs.
    #[serde(default = "d_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: d_ttl_secs(),
            sweep_interval_secs: d_sweep_interval_secs(),
        }
    }
}

fn d_ttl_secs() -> i64 {
    30
}
fn d_sweep_interval_secs() -> u64 {
    10
}
