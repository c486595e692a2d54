use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Memory,
    Redb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "d_engine")]
    pub engine: EngineKind,
    #[serde(default = "d_data_dir")]
    pub data_dir: String,
    /// Fraction of dead space that triggers a maintenance compaction tick.
    #[serde(default = "d_gc_reclaim_ratio")]
    pub gc_reclaim_ratio: f64,
    #[serde(default = "d_gc_interval_secs")]
    pub gc_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            engine: d_engine(),
            data_dir: d_data_dir(),
            gc_reclaim_ratio: d_gc_reclaim_ratio(),
            gc_interval_secs: d_gc_interval_secs(),
        }
    }
}

fn d_engine() -> EngineKind {
    EngineKind::Redb
}
fn d_data_dir() -> String {
    "./data".into()
}
fn d_gc_reclaim_ratio() -> f64 {
    0.5
}
fn d_gc_interval_secs() -> u64 {
    300
}
