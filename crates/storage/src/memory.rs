//! In-memory engine. Not persistent — all data is lost when the process
//! exits. Used for tests and for deployments that explicitly opt out of
//! durability (`storage.engine = "memory"`).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use konsul_domain::model::{KvEntry, ServiceEntry};
use parking_lot::RwLock;

use crate::{Engine, ExportedData, Result};

#[derive(Debug, Clone, Default)]
pub struct MemoryEngine {
    kv: Arc<RwLock<BTreeMap<String, KvEntry>>>,
    services: Arc<RwLock<BTreeMap<String, ServiceEntry>>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Engine for MemoryEngine {
    async fn kv_get(&self, key: &str) -> Result<Option<KvEntry>> {
        Ok(self.kv.read().get(key).cloned())
    }

    async fn kv_set(&self, key: &str, value: Vec<u8>) -> Result<KvEntry> {
        let mut kv = self.kv.write();
        let now = Utc::now();
        let entry = match kv.get(key) {
            Some(existing) => KvEntry {
                key: key.to_owned(),
                value,
                version: existing.version + 1,
                created_at: existing.created_at,
                updated_at: now,
            },
            None => KvEntry {
                key: key.to_owned(),
                value,
                version: 1,
                created_at: now,
                updated_at: now,
            },
        };
        kv.insert(key.to_owned(), entry.clone());
        Ok(entry)
    }

    async fn kv_delete(&self, key: &str) -> Result<bool> {
        Ok(self.kv.write().remove(key).is_some())
    }

    async fn kv_list(&self, prefix: &str) -> Result<Vec<KvEntry>> {
        let kv = self.kv.read();
        Ok(kv
            .range(prefix.to_owned()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn kv_batch_set(&self, entries: Vec<(String, Vec<u8>)>) -> Result<Vec<KvEntry>> {
        let mut kv = self.kv.write();
        let now = Utc::now();
        let mut out = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let entry = match kv.get(&key) {
                Some(existing) => KvEntry {
                    key: key.clone(),
                    value,
                    version: existing.version + 1,
                    created_at: existing.created_at,
                    updated_at: now,
                },
                None => KvEntry {
                    key: key.clone(),
                    value,
                    version: 1,
                    created_at: now,
                    updated_at: now,
                },
            };
            kv.insert(key, entry.clone());
            out.push(entry);
        }
        Ok(out)
    }

    async fn kv_batch_delete(&self, keys: Vec<String>) -> Result<()> {
        let mut kv = self.kv.write();
        for key in keys {
            kv.remove(&key);
        }
        Ok(())
    }

    async fn service_get(&self, name: &str) -> Result<Option<ServiceEntry>> {
        Ok(self.services.read().get(name).cloned())
    }

    async fn service_set(&self, entry: ServiceEntry) -> Result<()> {
        self.services.write().insert(entry.service.name.clone(), entry);
        Ok(())
    }

    async fn service_delete(&self, name: &str) -> Result<bool> {
        Ok(self.services.write().remove(name).is_some())
    }

    async fn service_list(&self) -> Result<Vec<ServiceEntry>> {
        Ok(self.services.read().values().cloned().collect())
    }

    async fn backup(&self, dest: &std::path::Path) -> Result<()> {
        let data = self.export_data().await?;
        crate::backup::export_tar_gz(dest, &data)
    }

    async fn restore(&self, src: &std::path::Path) -> Result<()> {
        let data = crate::backup::import_tar_gz(src)?;
        self.import_data(data).await
    }

    async fn export_data(&self) -> Result<ExportedData> {
        Ok(ExportedData {
            kv: self.kv.read().values().cloned().collect(),
            services: self.services.read().values().cloned().collect(),
        })
    }

    async fn import_data(&self, data: ExportedData) -> Result<()> {
        let mut kv = self.kv.write();
        kv.clear();
        for entry in data.kv {
            kv.insert(entry.key.clone(), entry);
        }
        drop(kv);

        let mut services = self.services.write();
        services.clear();
        for entry in data.services {
            services.insert(entry.service.name.clone(), entry);
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_roundtrip() {
        let engine = MemoryEngine::new();
        let entry = engine.kv_set("a/b", b"v1".to_vec()).await.unwrap();
        assert_eq!(entry.version, 1);
        let got = engine.kv_get("a/b").await.unwrap().unwrap();
        assert_eq!(got.value, b"v1");
    }

    #[tokio::test]
    async fn set_twice_increments_version_and_keeps_created_at() {
        let engine = MemoryEngine::new();
        let first = engine.kv_set("k", b"1".to_vec()).await.unwrap();
        let second = engine.kv_set("k", b"2".to_vec()).await.unwrap();
        assert_eq!(second.version, 2);
        assert_eq!(first.created_at, second.created_at);
    }

    #[tokio::test]
    async fn list_respects_prefix() {
        let engine = MemoryEngine::new();
        engine.kv_set("kv/data/a", b"1".to_vec()).await.unwrap();
        engine.kv_set("kv/data/b", b"2".to_vec()).await.unwrap();
        engine.kv_set("kv/other", b"3".to_vec()).await.unwrap();
        let listed = engine.kv_list("kv/data/").await.unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn batch_delete_ignores_missing_keys() {
        let engine = MemoryEngine::new();
        engine.kv_set("k1", b"1".to_vec()).await.unwrap();
        engine
            .kv_batch_delete(vec!["k1".into(), "does-not-exist".into()])
            .await
            .unwrap();
        assert!(engine.kv_get("k1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn export_then_import_restores_state() {
        let engine = MemoryEngine::new();
        engine.kv_set("k", b"v".to_vec()).await.unwrap();
        let data = engine.export_data().await.unwrap();

        let fresh = MemoryEngine::new();
        fresh.import_data(data).await.unwrap();
        assert_eq!(fresh.kv_get("k").await.unwrap().unwrap().value, b"v");
    }
}
