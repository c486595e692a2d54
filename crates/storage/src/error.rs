//! Storage error types.
//!
//! Every variant carries enough context to diagnose the problem without a
//! debugger.

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to open storage at '{path}': {reason}")]
    Open { path: String, reason: String },

    #[error("failed to read key '{key}': {reason}")]
    Read { key: String, reason: String },

    #[error("failed to write key '{key}': {reason}")]
    Write { key: String, reason: String },

    #[error("failed to delete key '{key}': {reason}")]
    Delete { key: String, reason: String },

    #[error("failed to list keys with prefix '{prefix}': {reason}")]
    List { prefix: String, reason: String },

    #[error("transaction failed: {reason}")]
    Transaction { reason: String },

    #[error("missing table '{name}'")]
    MissingTable { name: String },

    #[error("backup failed: {reason}")]
    Backup { reason: String },

    #[error("restore failed: {reason}")]
    Restore { reason: String },

    #[error("serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for konsul_domain::Error {
    fn from(e: StorageError) -> Self {
        konsul_domain::Error::Storage(e.to_string())
    }
}
