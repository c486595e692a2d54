//! Service catalog: register/heartbeat/deregister with TTL-based liveness,
//! backed by a [`konsul_storage::Engine`] for durability.

use std::sync::Arc;

use chrono::Utc;
use konsul_domain::model::{Service, ServiceEntry};
use konsul_storage::Engine;

pub type Result<T> = konsul_domain::Result<T>;

pub struct ServiceCatalog {
    engine: Arc<dyn Engine>,
    ttl: chrono::Duration,
}

impl ServiceCatalog {
    pub fn new(engine: Arc<dyn Engine>, ttl_secs: i64) -> Self {
        Self {
            engine,
            ttl: chrono::Duration::seconds(ttl_secs),
        }
    }

    /// Register a service, or refresh its heartbeat if already registered
    /// under the same name.
    pub async fn register(&self, service: Service) -> Result<()> {
        let entry = ServiceEntry {
            service,
            last_heartbeat: Utc::now(),
        };
        self.engine.service_set(entry).await?;
        Ok(())
    }

    /// Advance the heartbeat for an existing service. Returns `false` if
    /// no service is registered under that name.
    pub async fn heartbeat(&self, name: &str) -> Result<bool> {
        let Some(mut entry) = self.engine.service_get(name).await? else {
            return Ok(false);
        };
        entry.last_heartbeat = Utc::now();
        self.engine.service_set(entry).await?;
        Ok(true)
    }

    pub async fn deregister(&self, name: &str) -> Result<bool> {
        Ok(self.engine.service_delete(name).await?)
    }

    /// Fetch a service by name, `None` if it doesn't exist or its TTL has
    /// expired.
    pub async fn get(&self, name: &str) -> Result<Option<Service>> {
        let Some(entry) = self.engine.service_get(name).await? else {
            return Ok(None);
        };
        if entry.is_live(self.ttl, Utc::now()) {
            Ok(Some(entry.service))
        } else {
            Ok(None)
        }
    }

    /// List all services whose heartbeat hasn't expired.
    pub async fn list(&self) -> Result<Vec<Service>> {
        let now = Utc::now();
        let all = self.engine.service_list().await?;
        Ok(all
            .into_iter()
            .filter(|e| e.is_live(self.ttl, now))
            .map(|e| e.service)
            .collect())
    }

    /// Remove services whose heartbeat is older than the configured TTL.
    /// Returns the number of entries pruned.
    pub async fn cleanup_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let all = self.engine.service_list().await?;
        let mut pruned = 0;
        for entry in all {
            if !entry.is_live(self.ttl, now) {
                if self.engine.service_delete(&entry.service.name).await? {
                    pruned += 1;
                }
            }
        }
        if pruned > 0 {
            tracing::info!(pruned, "pruned expired services");
        }
        Ok(pruned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use konsul_storage::MemoryEngine;

    fn catalog(ttl_secs: i64) -> ServiceCatalog {
        ServiceCatalog::new(Arc::new(MemoryEngine::new()), ttl_secs)
    }

    fn svc(name: &str) -> Service {
        Service {
            name: name.into(),
            address: "10.0.0.1".into(),
            port: 8080,
        }
    }

    #[tokio::test]
    async fn register_then_get() {
        let cat = catalog(30);
        cat.register(svc("web")).await.unwrap();
        let got = cat.get("web").await.unwrap().unwrap();
        assert_eq!(got.port, 8080);
    }

    #[tokio::test]
    async fn expired_service_is_invisible_to_get_and_list() {
        let cat = catalog(-1); // already expired at registration
        cat.register(svc("web")).await.unwrap();
        assert!(cat.get("web").await.unwrap().is_none());
        assert!(cat.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cleanup_expired_removes_only_stale_entries() {
        let cat = catalog(30);
        cat.register(svc("fresh")).await.unwrap();

        let stale = ServiceCatalog::new(Arc::clone(&cat.engine), -1);
        stale.register(svc("stale")).await.unwrap();

        let pruned = cat.cleanup_expired().await.unwrap();
        assert_eq!(pruned, 1);
        assert!(cat.get("fresh").await.unwrap().is_some());
        assert!(cat.get("stale").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn heartbeat_on_unknown_service_returns_false() {
        let cat = catalog(30);
        assert!(!cat.heartbeat("ghost").await.unwrap());
    }

    #[tokio::test]
    async fn deregister_removes_service() {
        let cat = catalog(30);
        cat.register(svc("web")).await.unwrap();
        assert!(cat.deregister("web").await.unwrap());
        assert!(cat.get("web").await.unwrap().is_none());
    }
}
