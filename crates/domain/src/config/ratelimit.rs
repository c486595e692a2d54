use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Sustained requests per second, per identifier.
    #[serde(default = "d_rps")]
    pub requests_per_second: u32,
    /// Token bucket capacity.
    #[serde(default = "d_burst")]
    pub burst_size: u32,
    /// Idle buckets older than this are swept.
    #[serde(default = "d_idle_sweep_secs")]
    pub idle_sweep_secs: u64,
    #[serde(default)]
    pub whitelist: Vec<String>,
    #[serde(default)]
    pub blacklist: Vec<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_second: d_rps(),
            burst_size: d_burst(),
            idle_sweep_secs: d_idle_sweep_secs(),
            whitelist: Vec::new(),
            blacklist: Vec::new(),
        }
    }
}

fn d_rps() -> u32 {
    10
}
fn d_burst() -> u32 {
    20
}
fn d_idle_sweep_secs() -> u64 {
    300
}
