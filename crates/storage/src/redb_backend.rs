//! Pure-Rust redb engine: the default, durable storage backend.
//!
//! redb uses a copy-on-write B-tree internally, so reads never block
//! writes and there is no LSM-style compaction stall. All operations are
//! transactional; blocking redb calls are offloaded to the Tokio blocking
//! pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use konsul_domain::model::{KvEntry, ServiceEntry};
use redb::{Database, TableDefinition};

use crate::{Engine, ExportedData, Result, StorageError};

const KV_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");
const SERVICE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("services");

/// Durable key-value engine backed by redb.
///
/// Thread-safe via `Arc<Database>`. Clone freely — all clones share the
/// same underlying database handle.
pub struct RedbEngine {
    db: Arc<Database>,
    path: PathBuf,
}

impl std::fmt::Debug for RedbEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbEngine")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RedbEngine {
    /// Open or create the database file at `path`, creating parent
    /// directories and both tables if they don't exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(|e| StorageError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let txn = db.begin_write().map_err(|e| StorageError::Transaction {
            reason: e.to_string(),
        })?;
        {
            txn.open_table(KV_TABLE).map_err(|e| StorageError::MissingTable {
                name: format!("kv: {e}"),
            })?;
            txn.open_table(SERVICE_TABLE)
                .map_err(|e| StorageError::MissingTable {
                    name: format!("services: {e}"),
                })?;
        }
        txn.commit().map_err(|e| StorageError::Transaction {
            reason: e.to_string(),
        })?;

        Ok(Self {
            db: Arc::new(db),
            path: path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn encode<T: serde::Serialize>(v: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(v)?)
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

#[async_trait]
impl Engine for RedbEngine {
    async fn kv_get(&self, key: &str) -> Result<Option<KvEntry>> {
        let db = Arc::clone(&self.db);
        let key = key.to_owned();
        tokio::task::spawn_blocking(move || {
            let txn = db.begin_read().map_err(|e| StorageError::Transaction {
                reason: e.to_string(),
            })?;
            let table = txn.open_table(KV_TABLE).map_err(|e| StorageError::MissingTable {
                name: format!("kv: {e}"),
            })?;
            match table.get(key.as_str()).map_err(|e| StorageError::Read {
                key: key.clone(),
                reason: e.to_string(),
            })? {
                Some(v) => Ok(Some(decode(v.value())?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(|e| StorageError::Read {
            key: String::new(),
            reason: format!("blocking task panicked: {e}"),
        })?
    }

    async fn kv_set(&self, key: &str, value: Vec<u8>) -> Result<KvEntry> {
        let existing = self.kv_get(key).await?;
        let entry = build_entry(key, value, existing);
        let db = Arc::clone(&self.db);
        let encoded = encode(&entry)?;
        let key_owned = key.to_owned();
        tokio::task::spawn_blocking(move || {
            let txn = db.begin_write().map_err(|e| StorageError::Transaction {
                reason: e.to_string(),
            })?;
            {
                let mut table =
                    txn.open_table(KV_TABLE).map_err(|e| StorageError::MissingTable {
                        name: format!("kv: {e}"),
                    })?;
                table
                    .insert(key_owned.as_str(), encoded.as_slice())
                    .map_err(|e| StorageError::Write {
                        key: key_owned.clone(),
                        reason: e.to_string(),
                    })?;
            }
            txn.commit().map_err(|e| StorageError::Transaction {
                reason: e.to_string(),
            })?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Write {
            key: String::new(),
            reason: format!("blocking task panicked: {e}"),
        })??;
        Ok(entry)
    }

    async fn kv_delete(&self, key: &str) -> Result<bool> {
        let db = Arc::clone(&self.db);
        let key = key.to_owned();
        tokio::task::spawn_blocking(move || {
            let txn = db.begin_write().map_err(|e| StorageError::Transaction {
                reason: e.to_string(),
            })?;
            let existed;
            {
                let mut table =
                    txn.open_table(KV_TABLE).map_err(|e| StorageError::MissingTable {
                        name: format!("kv: {e}"),
                    })?;
                existed = table
                    .remove(key.as_str())
                    .map_err(|e| StorageError::Delete {
                        key: key.clone(),
                        reason: e.to_string(),
                    })?
                    .is_some();
            }
            txn.commit().map_err(|e| StorageError::Transaction {
                reason: e.to_string(),
            })?;
            Ok(existed)
        })
        .await
        .map_err(|e| StorageError::Delete {
            key: String::new(),
            reason: format!("blocking task panicked: {e}"),
        })?
    }

    async fn kv_list(&self, prefix: &str) -> Result<Vec<KvEntry>> {
        let db = Arc::clone(&self.db);
        let prefix = prefix.to_owned();
        tokio::task::spawn_blocking(move || {
            let txn = db.begin_read().map_err(|e| StorageError::Transaction {
                reason: e.to_string(),
            })?;
            let table = txn.open_table(KV_TABLE).map_err(|e| StorageError::MissingTable {
                name: format!("kv: {e}"),
            })?;
            let mut entries = Vec::new();
            let range = table
                .range(prefix.as_str()..)
                .map_err(|e| StorageError::List {
                    prefix: prefix.clone(),
                    reason: e.to_string(),
                })?;
            for item in range {
                let (k, v) = item.map_err(|e| StorageError::List {
                    prefix: prefix.clone(),
                    reason: e.to_string(),
                })?;
                if !k.value().starts_with(&prefix) {
                    break;
                }
                entries.push(decode(v.value())?);
            }
            Ok(entries)
        })
        .await
        .map_err(|e| StorageError::List {
            prefix: String::new(),
            reason: format!("blocking task panicked: {e}"),
        })?
    }

    async fn kv_batch_set(&self, entries: Vec<(String, Vec<u8>)>) -> Result<Vec<KvEntry>> {
        let mut built = Vec::with_capacity(entries.len());
        for (key, value) in &entries {
            let existing = self.kv_get(key).await?;
            built.push(build_entry(key, value.clone(), existing));
        }
        let encoded: Vec<(String, Vec<u8>)> = built
            .iter()
            .map(|e| Ok((e.key.clone(), encode(e)?)))
            .collect::<Result<_>>()?;

        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let txn = db.begin_write().map_err(|e| StorageError::Transaction {
                reason: e.to_string(),
            })?;
            {
                let mut table =
                    txn.open_table(KV_TABLE).map_err(|e| StorageError::MissingTable {
                        name: format!("kv: {e}"),
                    })?;
                for (key, bytes) in &encoded {
                    table
                        .insert(key.as_str(), bytes.as_slice())
                        .map_err(|e| StorageError::Write {
                            key: key.clone(),
                            reason: e.to_string(),
                        })?;
                }
            }
            txn.commit().map_err(|e| StorageError::Transaction {
                reason: e.to_string(),
            })?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Transaction {
            reason: format!("blocking task panicked: {e}"),
        })??;
        Ok(built)
    }

    async fn kv_batch_delete(&self, keys: Vec<String>) -> Result<()> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let txn = db.begin_write().map_err(|e| StorageError::Transaction {
                reason: e.to_string(),
            })?;
            {
                let mut table =
                    txn.open_table(KV_TABLE).map_err(|e| StorageError::MissingTable {
                        name: format!("kv: {e}"),
                    })?;
                for key in &keys {
                    table.remove(key.as_str()).map_err(|e| StorageError::Delete {
                        key: key.clone(),
                        reason: e.to_string(),
                    })?;
                }
            }
            txn.commit().map_err(|e| StorageError::Transaction {
                reason: e.to_string(),
            })?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Transaction {
            reason: format!("blocking task panicked: {e}"),
        })?
    }

    async fn service_get(&self, name: &str) -> Result<Option<ServiceEntry>> {
        let db = Arc::clone(&self.db);
        let name = name.to_owned();
        tokio::task::spawn_blocking(move || {
            let txn = db.begin_read().map_err(|e| StorageError::Transaction {
                reason: e.to_string(),
            })?;
            let table =
                txn.open_table(SERVICE_TABLE)
                    .map_err(|e| StorageError::MissingTable {
                        name: format!("services: {e}"),
                    })?;
            match table.get(name.as_str()).map_err(|e| StorageError::Read {
                key: name.clone(),
                reason: e.to_string(),
            })? {
                Some(v) => Ok(Some(decode(v.value())?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(|e| StorageError::Read {
            key: String::new(),
            reason: format!("blocking task panicked: {e}"),
        })?
    }

    async fn service_set(&self, entry: ServiceEntry) -> Result<()> {
        let db = Arc::clone(&self.db);
        let name = entry.service.name.clone();
        let encoded = encode(&entry)?;
        tokio::task::spawn_blocking(move || {
            let txn = db.begin_write().map_err(|e| StorageError::Transaction {
                reason: e.to_string(),
            })?;
            {
                let mut table =
                    txn.open_table(SERVICE_TABLE)
                        .map_err(|e| StorageError::MissingTable {
                            name: format!("services: {e}"),
                        })?;
                table
                    .insert(name.as_str(), encoded.as_slice())
                    .map_err(|e| StorageError::Write {
                        key: name.clone(),
                        reason: e.to_string(),
                    })?;
            }
            txn.commit().map_err(|e| StorageError::Transaction {
                reason: e.to_string(),
            })?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Write {
            key: String::new(),
            reason: format!("blocking task panicked: {e}"),
        })?
    }

    async fn service_delete(&self, name: &str) -> Result<bool> {
        let db = Arc::clone(&self.db);
        let name = name.to_owned();
        tokio::task::spawn_blocking(move || {
            let txn = db.begin_write().map_err(|e| StorageError::Transaction {
                reason: e.to_string(),
            })?;
            let existed;
            {
                let mut table =
                    txn.open_table(SERVICE_TABLE)
                        .map_err(|e| StorageError::MissingTable {
                            name: format!("services: {e}"),
                        })?;
                existed = table
                    .remove(name.as_str())
                    .map_err(|e| StorageError::Delete {
                        key: name.clone(),
                        reason: e.to_string(),
                    })?
                    .is_some();
            }
            txn.commit().map_err(|e| StorageError::Transaction {
                reason: e.to_string(),
            })?;
            Ok(existed)
        })
        .await
        .map_err(|e| StorageError::Delete {
            key: String::new(),
            reason: format!("blocking task panicked: {e}"),
        })?
    }

    async fn service_list(&self) -> Result<Vec<ServiceEntry>> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let txn = db.begin_read().map_err(|e| StorageError::Transaction {
                reason: e.to_string(),
            })?;
            let table =
                txn.open_table(SERVICE_TABLE)
                    .map_err(|e| StorageError::MissingTable {
                        name: format!("services: {e}"),
                    })?;
            let mut out = Vec::new();
            for item in table.iter().map_err(|e| StorageError::List {
                prefix: String::new(),
                reason: e.to_string(),
            })? {
                let (_, v) = item.map_err(|e| StorageError::List {
                    prefix: String::new(),
                    reason: e.to_string(),
                })?;
                out.push(decode(v.value())?);
            }
            Ok(out)
        })
        .await
        .map_err(|e| StorageError::List {
            prefix: String::new(),
            reason: format!("blocking task panicked: {e}"),
        })?
    }

    async fn backup(&self, dest: &Path) -> Result<()> {
        let data = self.export_data().await?;
        crate::backup::export_tar_gz(dest, &data)
    }

    async fn restore(&self, src: &Path) -> Result<()> {
        let data = crate::backup::import_tar_gz(src)?;
        self.import_data(data).await
    }

    async fn export_data(&self) -> Result<ExportedData> {
        Ok(ExportedData {
            kv: self.kv_list("").await?,
            services: self.service_list().await?,
        })
    }

    async fn import_data(&self, data: ExportedData) -> Result<()> {
        let db = Arc::clone(&self.db);
        let kv_encoded: Vec<(String, Vec<u8>)> = data
            .kv
            .iter()
            .map(|e| Ok((e.key.clone(), encode(e)?)))
            .collect::<Result<_>>()?;
        let svc_encoded: Vec<(String, Vec<u8>)> = data
            .services
            .iter()
            .map(|e| Ok((e.service.name.clone(), encode(e)?)))
            .collect::<Result<_>>()?;

        tokio::task::spawn_blocking(move || {
            let txn = db.begin_write().map_err(|e| StorageError::Transaction {
                reason: e.to_string(),
            })?;
            {
                let mut kv_table =
                    txn.open_table(KV_TABLE).map_err(|e| StorageError::MissingTable {
                        name: format!("kv: {e}"),
                    })?;
                for key in kv_table
                    .iter()
                    .map_err(|e| StorageError::Transaction {
                        reason: e.to_string(),
                    })?
                    .filter_map(|r| r.ok())
                    .map(|(k, _)| k.value().to_owned())
                    .collect::<Vec<_>>()
                {
                    kv_table.remove(key.as_str()).ok();
                }
                for (key, bytes) in &kv_encoded {
                    kv_table
                        .insert(key.as_str(), bytes.as_slice())
                        .map_err(|e| StorageError::Write {
                            key: key.clone(),
                            reason: e.to_string(),
                        })?;
                }
            }
            {
                let mut svc_table =
                    txn.open_table(SERVICE_TABLE)
                        .map_err(|e| StorageError::MissingTable {
                            name: format!("services: {e}"),
                        })?;
                for key in svc_table
                    .iter()
                    .map_err(|e| StorageError::Transaction {
                        reason: e.to_string(),
                    })?
                    .filter_map(|r| r.ok())
                    .map(|(k, _)| k.value().to_owned())
                    .collect::<Vec<_>>()
                {
                    svc_table.remove(key.as_str()).ok();
                }
                for (key, bytes) in &svc_encoded {
                    svc_table
                        .insert(key.as_str(), bytes.as_slice())
                        .map_err(|e| StorageError::Write {
                            key: key.clone(),
                            reason: e.to_string(),
                        })?;
                }
            }
            txn.commit().map_err(|e| StorageError::Transaction {
                reason: e.to_string(),
            })?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Transaction {
            reason: format!("blocking task panicked: {e}"),
        })?
    }

    async fn maintain(&self) -> Result<()> {
        // redb compacts copy-on-write garbage internally on commit; there is
        // no manual reclaim-ratio knob to drive here. This is a deliberate
        // no-op kept so the supervisor's maintenance tick has a stable
        // target regardless of which engine is configured.
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

fn build_entry(key: &str, value: Vec<u8>, existing: Option<KvEntry>) -> KvEntry {
    let now = chrono::Utc::now();
    match existing {
        Some(e) => KvEntry {
            key: key.to_owned(),
            value,
            version: e.version + 1,
            created_at: e.created_at,
            updated_at: now,
        },
        None => KvEntry {
            key: key.to_owned(),
            value,
            version: 1,
            created_at: now,
            updated_at: now,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_creates_parent_dir_and_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/data.redb");
        let engine = RedbEngine::open(&path).unwrap();
        engine.kv_set("k", b"v".to_vec()).await.unwrap();
        let got = engine.kv_get("k").await.unwrap().unwrap();
        assert_eq!(got.value, b"v");
    }

    #[tokio::test]
    async fn backup_then_restore_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let engine = RedbEngine::open(dir.path().join("data.redb")).unwrap();
        engine.kv_set("k", b"v".to_vec()).await.unwrap();
        let snapshot = dir.path().join("backup.tar.gz");
        engine.backup(&snapshot).await.unwrap();

        engine.kv_delete("k").await.unwrap();
        assert!(engine.kv_get("k").await.unwrap().is_none());

        engine.restore(&snapshot).await.unwrap();
        assert_eq!(engine.kv_get("k").await.unwrap().unwrap().value, b"v");
    }
}
