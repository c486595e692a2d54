use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSink {
    File,
    Stdout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditBackpressure {
    Drop,
    Block,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "d_sink")]
    pub sink: AuditSink,
    #[serde(default = "d_file_path")]
    pub file_path: String,
    #[serde(default = "d_buffer_size")]
    pub buffer_size: usize,
    #[serde(default = "d_backpressure")]
    pub backpressure: AuditBackpressure,
    #[serde(default = "d_flush_interval_secs")]
    pub flush_interval_secs: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sink: d_sink(),
            file_path: d_file_path(),
            buffer_size: d_buffer_size(),
            backpressure: d_backpressure(),
            flush_interval_secs: d_flush_interval_secs(),
        }
    }
}

fn d_sink() -> AuditSink {
    AuditSink::File
}
fn d_file_path() -> String {
    "./data/audit.log".into()
}
fn d_buffer_size() -> usize {
    1024
}
fn d_backpressure() -> AuditBackpressure {
    AuditBackpressure::Drop
}
fn d_flush_interval_secs() -> u64 {
    5
}
