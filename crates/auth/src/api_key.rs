//! API key issuance and verification.
//!
//! Keys are `<prefix>_<64 hex chars>` (32 random bytes from a CSPRNG). Only
//! the SHA-256 hash of a key is ever persisted; the raw key is shown to the
//! caller exactly once, at creation time.

use std::sync::Arc;

use chrono::Utc;
use konsul_domain::model::{ApiKeyPublic, ApiKeyRecord};
use konsul_storage::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::AuthError;

const NAMESPACE: &str = "_system/apikeys/";

pub struct ApiKeyService {
    engine: Arc<dyn Engine>,
    prefix: String,
}

impl ApiKeyService {
    pub fn new(engine: Arc<dyn Engine>, prefix: impl Into<String>) -> Self {
        Self {
            engine,
            prefix: prefix.into(),
        }
    }

    fn storage_key(id: &Uuid) -> String {
        format!("{NAMESPACE}{id}")
    }

    fn hash(raw: &str) -> String {
        hex::encode(Sha256::digest(raw.as_bytes()))
    }

    /// Mint a new key. Returns the raw key (to hand to the caller) and the
    /// stored record (hash only).
    pub async fn create(
        &self,
        name: impl Into<String>,
        permissions: Vec<String>,
        expires_at: Option<chrono::DateTime<Utc>>,
    ) -> konsul_domain::Result<(String, ApiKeyRecord)> {
        let mut raw_bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut raw_bytes);
        let raw = format!("{}_{}", self.prefix, hex::encode(raw_bytes));

        let record = ApiKeyRecord {
            id: Uuid::new_v4(),
            name: name.into(),
            stored_hash: Self::hash(&raw),
            permissions,
            metadata: Default::default(),
            created_at: Utc::now(),
            expires_at,
            last_used_at: None,
            enabled: true,
        };

        self.engine
            .kv_set(
                &Self::storage_key(&record.id),
                serde_json::to_vec(&record)?,
            )
            .await?;

        Ok((raw, record))
    }

    /// Verify a raw key, updating `last_used_at` on success.
    pub async fn verify(&self, raw: &str) -> konsul_domain::Result<ApiKeyRecord> {
        let provided_hash = Self::hash(raw);
        let candidates = self.engine.kv_list(NAMESPACE).await?;

        let mut matched: Option<ApiKeyRecord> = None;
        for entry in candidates {
            let record: ApiKeyRecord = serde_json::from_slice(&entry.value)?;
            if bool::from(
                record
                    .stored_hash
                    .as_bytes()
                    .ct_eq(provided_hash.as_bytes()),
            ) {
                matched = Some(record);
                break;
            }
        }

        let mut record = matched.ok_or(AuthError::ApiKeyNotFound)?;
        if !record.enabled {
            return Err(AuthError::ApiKeyDisabled.into());
        }
        if record.expires_at.is_some_and(|exp| exp < Utc::now()) {
            return Err(AuthError::ApiKeyExpired.into());
        }

        record.last_used_at = Some(Utc::now());
        self.engine
            .kv_set(&Self::storage_key(&record.id), serde_json::to_vec(&record)?)
            .await?;
        Ok(record)
    }

    pub async fn get(&self, id: &Uuid) -> konsul_domain::Result<Option<ApiKeyPublic>> {
        match self.engine.kv_get(&Self::storage_key(id)).await? {
            Some(entry) => {
                let record: ApiKeyRecord = serde_json::from_slice(&entry.value)?;
                Ok(Some(ApiKeyPublic::from(&record)))
            }
            None => Ok(None),
        }
    }

    pub async fn list(&self) -> konsul_domain::Result<Vec<ApiKeyPublic>> {
        let entries = self.engine.kv_list(NAMESPACE).await?;
        entries
            .iter()
            .map(|e| {
                let record: ApiKeyRecord = serde_json::from_slice(&e.value)?;
                Ok(ApiKeyPublic::from(&record))
            })
            .collect()
    }

    /// Disable the key without removing its record (reversible).
    pub async fn revoke(&self, id: &Uuid) -> konsul_domain::Result<bool> {
        let key = Self::storage_key(id);
        let Some(entry) = self.engine.kv_get(&key).await? else {
            return Ok(false);
        };
        let mut record: ApiKeyRecord = serde_json::from_slice(&entry.value)?;
        record.enabled = false;
        self.engine.kv_set(&key, serde_json::to_vec(&record)?).await?;
        Ok(true)
    }

    /// Permanently remove the key's record.
    pub async fn delete(&self, id: &Uuid) -> konsul_domain::Result<bool> {
        Ok(self.engine.kv_delete(&Self::storage_key(id)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use konsul_storage::MemoryEngine;

    fn service() -> ApiKeyService {
        ApiKeyService::new(Arc::new(MemoryEngine::new()), "kns")
    }

    #[tokio::test]
    async fn create_then_verify_succeeds() {
        let svc = service();
        let (raw, record) = svc.create("ci", vec!["kv:read".into()], None).await.unwrap();
        assert!(raw.starts_with("kns_"));
        let verified = svc.verify(&raw).await.unwrap();
        assert_eq!(verified.id, record.id);
        assert!(verified.last_used_at.is_some());
    }

    #[tokio::test]
    async fn wrong_key_is_not_found() {
        let svc = service();
        svc.create("ci", vec![], None).await.unwrap();
        assert!(matches!(
            svc.verify("kns_deadbeef").await,
            Err(konsul_domain::Error::Auth(_))
        ));
    }

    #[tokio::test]
    async fn revoked_key_is_rejected() {
        let svc = service();
        let (raw, record) = svc.create("ci", vec![], None).await.unwrap();
        assert!(svc.revoke(&record.id).await.unwrap());
        assert!(svc.verify(&raw).await.is_err());
    }

    #[tokio::test]
    async fn expired_key_is_rejected() {
        let svc = service();
        let (raw, _) = svc
            .create("ci", vec![], Some(Utc::now() - chrono::Duration::seconds(1)))
            .await
            .unwrap();
        assert!(svc.verify(&raw).await.is_err());
    }

    #[tokio::test]
    async fn has_permission_accepts_wildcard() {
        let mut record = ApiKeyRecord {
            id: Uuid::new_v4(),
            name: "x".into(),
            stored_hash: "h".into(),
            permissions: vec!["*".into()],
            metadata: Default::default(),
            created_at: Utc::now(),
            expires_at: None,
            last_used_at: None,
            enabled: true,
        };
        assert!(record.has_permission("anything"));
        record.permissions = vec!["kv:read".into()];
        assert!(record.has_permission("kv:read"));
        assert!(!record.has_permission("kv:write"));
    }
}
