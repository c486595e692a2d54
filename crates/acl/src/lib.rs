//! ACL evaluator: named policies, path-pattern matching, deny-wins
//! evaluation.

mod pattern;

use std::collections::HashMap;
use std::sync::Arc;

use konsul_domain::model::{AclRule, Capability, Policy};
use konsul_storage::Engine;
use parking_lot::RwLock;

const NAMESPACE: &str = "_system/policies/";

pub struct PolicyStore {
    engine: Arc<dyn Engine>,
    cache: RwLock<HashMap<String, Policy>>,
}

impl PolicyStore {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn storage_key(name: &str) -> String {
        format!("{NAMESPACE}{name}")
    }

    pub async fn add(&self, policy: Policy) -> konsul_domain::Result<()> {
        self.engine
            .kv_set(&Self::storage_key(&policy.name), serde_json::to_vec(&policy)?)
            .await?;
        self.cache.write().insert(policy.name.clone(), policy);
        Ok(())
    }

    pub async fn update(&self, policy: Policy) -> konsul_domain::Result<()> {
        self.add(policy).await
    }

    pub async fn delete(&self, name: &str) -> konsul_domain::Result<bool> {
        let removed = self.engine.kv_delete(&Self::storage_key(name)).await?;
        self.cache.write().remove(name);
        Ok(removed)
    }

    pub async fn get(&self, name: &str) -> konsul_domain::Result<Option<Policy>> {
        if let Some(p) = self.cache.read().get(name).cloned() {
            return Ok(Some(p));
        }
        match self.engine.kv_get(&Self::storage_key(name)).await? {
            Some(entry) => {
                let policy: Policy = serde_json::from_slice(&entry.value)?;
                self.cache.write().insert(name.to_owned(), policy.clone());
                Ok(Some(policy))
            }
            None => Ok(None),
        }
    }

    pub async fn list(&self) -> konsul_domain::Result<Vec<Policy>> {
        let entries = self.engine.kv_list(NAMESPACE).await?;
        entries
            .iter()
            .map(|e| Ok(serde_json::from_slice(&e.value)?))
            .collect()
    }
}

/// Evaluates a set of named policies against a requested resource and
/// capability. A single matching `Deny` rule anywhere in the policy set
/// overrides any matching `Allow`.
pub struct AclEvaluator {
    default_allow: bool,
}

impl AclEvaluator {
    pub fn new(default_policy_allows: bool) -> Self {
        Self {
            default_allow: default_policy_allows,
        }
    }

    /// `rules` is the flattened rule list for the resource class being
    /// checked (e.g. `policy.kv` for a KV request).
    pub fn evaluate(&self, rules: &[AclRule], path: &str, capability: Capability) -> bool {
        let mut allowed = self.default_allow;

        for rule in rules {
            let re = match pattern::compile(&rule.pattern) {
                Ok(re) => re,
                Err(e) => {
                    tracing::warn!(pattern = %rule.pattern, error = %e, "invalid ACL pattern, skipping");
                    continue;
                }
            };
            if !re.is_match(path) {
                continue;
            }
            if rule.capabilities.contains(&Capability::Deny) {
                return false;
            }
            if rule.capabilities.contains(&capability) || rule.capabilities.contains(&Capability::Admin) {
                allowed = true;
            }
        }

        allowed
    }

    /// Evaluate across every policy a caller holds. Deny wins globally:
    /// if any policy denies, the request is denied regardless of what
    /// other policies allow.
    pub fn evaluate_all<'a>(
        &self,
        policies: impl IntoIterator<Item = &'a [AclRule]>,
        path: &str,
        capability: Capability,
    ) -> bool {
        let mut allowed = self.default_allow;
        for rules in policies {
            for rule in rules {
                let re = match pattern::compile(&rule.pattern) {
                    Ok(re) => re,
                    Err(_) => continue,
                };
                if !re.is_match(path) {
                    continue;
                }
                if rule.capabilities.contains(&Capability::Deny) {
                    return false;
                }
                if rule.capabilities.contains(&capability) {
                    allowed = true;
                }
            }
        }
        allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use konsul_storage::MemoryEngine;

    fn rule(pattern: &str, caps: Vec<Capability>) -> AclRule {
        AclRule {
            pattern: pattern.into(),
            capabilities: caps,
        }
    }

    #[test]
    fn no_matching_rule_falls_back_to_default() {
        let eval = AclEvaluator::new(false);
        assert!(!eval.evaluate(&[], "kv/app/config", Capability::Read));
        let eval = AclEvaluator::new(true);
        assert!(eval.evaluate(&[], "kv/app/config", Capability::Read));
    }

    #[test]
    fn matching_allow_rule_grants_capability() {
        let eval = AclEvaluator::new(false);
        let rules = vec![rule("kv/app/*", vec![Capability::Read, Capability::Write])];
        assert!(eval.evaluate(&rules, "kv/app/config", Capability::Read));
        assert!(!eval.evaluate(&rules, "kv/app/config", Capability::Delete));
    }

    #[test]
    fn deny_rule_overrides_allow_within_same_resource() {
        let eval = AclEvaluator::new(true);
        let rules = vec![
            rule("kv/app/*", vec![Capability::Read]),
            rule("kv/app/secret", vec![Capability::Deny]),
        ];
        assert!(!eval.evaluate(&rules, "kv/app/secret", Capability::Read));
        assert!(eval.evaluate(&rules, "kv/app/config", Capability::Read));
    }

    #[test]
    fn admin_capability_grants_any_requested_capability() {
        let eval = AclEvaluator::new(false);
        let rules = vec![rule("admin", vec![Capability::Admin])];
        assert!(eval.evaluate(&rules, "admin", Capability::Read));
        assert!(eval.evaluate(&rules, "admin", Capability::Write));
    }

    #[test]
    fn deny_wins_across_multiple_policies() {
        let eval = AclEvaluator::new(false);
        let allow = vec![rule("kv/**", vec![Capability::Read])];
        let deny = vec![rule("kv/secret/*", vec![Capability::Deny])];
        assert!(!eval.evaluate_all(
            [allow.as_slice(), deny.as_slice()],
            "kv/secret/token",
            Capability::Read
        ));
    }

    #[tokio::test]
    async fn policy_store_roundtrips_through_engine() {
        let store = PolicyStore::new(Arc::new(MemoryEngine::new()));
        let policy = Policy {
            name: "readonly".into(),
            kv: vec![rule("kv/**", vec![Capability::Read])],
            ..Default::default()
        };
        store.add(policy).await.unwrap();
        let got = store.get("readonly").await.unwrap().unwrap();
        assert_eq!(got.kv.len(), 1);
    }
}
