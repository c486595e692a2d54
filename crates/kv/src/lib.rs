//! The KV store: a thin, write-through layer over a [`konsul_storage::Engine`].
//!
//! Holds no state of its own beyond a mutation counter used for metrics —
//! every read and write goes straight to the engine, so durability and
//! concurrency guarantees come entirely from the engine in use.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use konsul_domain::model::KvEntry;
use konsul_storage::Engine;

pub type Result<T> = konsul_domain::Result<T>;

pub struct KvStore {
    engine: Arc<dyn Engine>,
    mutations: AtomicU64,
}

impl KvStore {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            mutations: AtomicU64::new(0),
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<KvEntry>> {
        Ok(self.engine.kv_get(key).await?)
    }

    pub async fn set(&self, key: &str, value: Vec<u8>) -> Result<KvEntry> {
        let entry = self.engine.kv_set(key, value).await?;
        self.mutations.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key, version = entry.version, "kv set");
        Ok(entry)
    }

    pub async fn delete(&self, key: &str) -> Result<bool> {
        let deleted = self.engine.kv_delete(key).await?;
        if deleted {
            self.mutations.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key, "kv delete");
        }
        Ok(deleted)
    }

    pub async fn list(&self, prefix: &str) -> Result<Vec<KvEntry>> {
        Ok(self.engine.kv_list(prefix).await?)
    }

    pub async fn batch_set(&self, entries: Vec<(String, Vec<u8>)>) -> Result<Vec<KvEntry>> {
        let n = entries.len() as u64;
        let out = self.engine.kv_batch_set(entries).await?;
        self.mutations.fetch_add(n, Ordering::Relaxed);
        Ok(out)
    }

    pub async fn batch_delete(&self, keys: Vec<String>) -> Result<()> {
        let n = keys.len() as u64;
        self.engine.kv_batch_delete(keys).await?;
        self.mutations.fetch_add(n, Ordering::Relaxed);
        Ok(())
    }

    /// Total successful mutations (set/delete/batch) since startup. Fed
    /// into the metrics endpoint.
    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(Ordering::Relaxed)
    }

    pub async fn close(&self) -> Result<()> {
        Ok(self.engine.close().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use konsul_storage::MemoryEngine;

    fn store() -> KvStore {
        KvStore::new(Arc::new(MemoryEngine::new()))
    }

    #[tokio::test]
    async fn set_get_delete() {
        let kv = store();
        kv.set("k", b"v".to_vec()).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap().unwrap().value, b"v");
        assert!(kv.delete("k").await.unwrap());
        assert!(kv.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mutation_count_tracks_writes_and_deletes_not_reads() {
        let kv = store();
        kv.set("k", b"v".to_vec()).await.unwrap();
        kv.get("k").await.unwrap();
        kv.delete("k").await.unwrap();
        assert_eq!(kv.mutation_count(), 2);
    }

    #[tokio::test]
    async fn delete_of_missing_key_does_not_bump_mutation_count() {
        let kv = store();
        kv.delete("nope").await.unwrap();
        assert_eq!(kv.mutation_count(), 0);
    }
}
