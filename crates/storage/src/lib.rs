//! Pluggable persistence engines for konsul.
//!
//! Everything above this crate — the KV store, the service catalog, the
//! auth and ACL stores — talks to an `Engine` trait object rather than a
//! concrete backend. Two implementations ship here: [`MemoryEngine`] for
//! tests and ephemeral deployments, and [`RedbEngine`] for durable,
//! crash-safe storage on disk.

mod backup;
mod error;
mod memory;
mod redb_backend;

pub use backup::{export_tar_gz, import_tar_gz};
pub use error::StorageError;
pub use memory::MemoryEngine;
pub use redb_backend::RedbEngine;

use async_trait::async_trait;
use konsul_domain::model::{KvEntry, ServiceEntry};

pub type Result<T> = std::result::Result<T, StorageError>;

/// Full export of the store's contents, used by backup/restore and by
/// import/export endpoints. Kept as a plain serializable struct rather
/// than a stream so a single backup is always internally consistent.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ExportedData {
    pub kv: Vec<KvEntry>,
    pub services: Vec<ServiceEntry>,
}

/// A persistence engine. Implementations must be safe to share behind an
/// `Arc` and to call concurrently from many tasks; any internal locking is
/// the implementation's responsibility.
#[async_trait]
pub trait Engine: Send + Sync {
    async fn kv_get(&self, key: &str) -> Result<Option<KvEntry>>;
    async fn kv_set(&self, key: &str, value: Vec<u8>) -> Result<KvEntry>;
    async fn kv_delete(&self, key: &str) -> Result<bool>;
    async fn kv_list(&self, prefix: &str) -> Result<Vec<KvEntry>>;

    /// Apply all writes as a single atomic unit, or none of them.
    async fn kv_batch_set(&self, entries: Vec<(String, Vec<u8>)>) -> Result<Vec<KvEntry>>;
    /// Delete all given keys as a single atomic unit. Missing keys are
    /// ignored rather than rejected.
    async fn kv_batch_delete(&self, keys: Vec<String>) -> Result<()>;

    async fn service_get(&self, name: &str) -> Result<Option<ServiceEntry>>;
    async fn service_set(&self, entry: ServiceEntry) -> Result<()>;
    async fn service_delete(&self, name: &str) -> Result<bool>;
    async fn service_list(&self) -> Result<Vec<ServiceEntry>>;

    /// Snapshot the full store to `dest` as a gzip-compressed tarball.
    async fn backup(&self, dest: &std::path::Path) -> Result<()>;
    /// Replace the store's contents with the snapshot at `src`. Callers
    /// should treat this as destructive: existing data not present in the
    /// snapshot is discarded.
    async fn restore(&self, src: &std::path::Path) -> Result<()>;

    async fn export_data(&self) -> Result<ExportedData>;
    async fn import_data(&self, data: ExportedData) -> Result<()>;

    /// Run a maintenance pass (e.g. value-log compaction). Best-effort:
    /// engines that have nothing to reclaim simply return `Ok(())`.
    async fn maintain(&self) -> Result<()> {
        Ok(())
    }

    /// Flush and release any held resources. Idempotent.
    async fn close(&self) -> Result<()>;
}
