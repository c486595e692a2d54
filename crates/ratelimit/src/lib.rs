//! Token-bucket rate limiting, per identifier (IP or API key), with
//! dynamic per-identifier overrides, violation history, and static
//! whitelist/blacklist access lists.
//!
//! In-memory and lock-protected (`parking_lot::RwLock`), matching the
//! rest of the workspace's in-process state stores. Nothing here is
//! persisted — a restart clears all buckets and overrides.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

const MAX_VIOLATION_HISTORY: usize = 100;

/// Per-identifier override of the default rate/burst, with an optional
/// expiry after which the default applies again.
#[derive(Debug, Clone, Copy)]
pub struct Override {
    pub rate_per_sec: f64,
    pub burst: f64,
    pub expires_at: Option<DateTime<Utc>>,
}

struct Bucket {
    tokens: f64,
    last_refill: DateTime<Utc>,
    allowed: u64,
    denied: u64,
    violations: VecDeque<DateTime<Utc>>,
    over: Option<Override>,
}

impl Bucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_refill: Utc::now(),
            allowed: 0,
            denied: 0,
            violations: VecDeque::new(),
            over: None,
        }
    }
}

/// Result of a rate-limit check, carrying everything needed for the
/// RFC 6585 response headers.
#[derive(Debug, Clone, Copy)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_after_secs: u64,
    pub retry_after_secs: Option<u64>,
}

pub struct RateLimiter {
    default_rate: f64,
    default_burst: f64,
    buckets: RwLock<HashMap<String, Bucket>>,
    whitelist: RwLock<HashSet<String>>,
    blacklist: RwLock<HashSet<String>>,
}

impl RateLimiter {
    pub fn new(requests_per_second: u32, burst_size: u32) -> Self {
        Self {
            default_rate: requests_per_second as f64,
            default_burst: burst_size as f64,
            buckets: RwLock::new(HashMap::new()),
            whitelist: RwLock::new(HashSet::new()),
            blacklist: RwLock::new(HashSet::new()),
        }
    }

    pub fn with_lists(mut self, whitelist: Vec<String>, blacklist: Vec<String>) -> Self {
        self.whitelist = RwLock::new(whitelist.into_iter().collect());
        self.blacklist = RwLock::new(blacklist.into_iter().collect());
        self
    }

    pub fn is_whitelisted(&self, identifier: &str) -> bool {
        self.whitelist.read().contains(identifier)
    }

    pub fn is_blacklisted(&self, identifier: &str) -> bool {
        self.blacklist.read().contains(identifier)
    }

    /// Attach a time-limited (or permanent, if `ttl_secs` is `None`)
    /// rate/burst override for one identifier.
    pub fn set_override(&self, identifier: &str, rate_per_sec: f64, burst: f64, ttl_secs: Option<i64>) {
        let expires_at = ttl_secs.map(|s| Utc::now() + chrono::Duration::seconds(s));
        let mut buckets = self.buckets.write();
        let bucket = buckets
            .entry(identifier.to_owned())
            .or_insert_with(|| Bucket::new(self.default_burst));
        bucket.over = Some(Override {
            rate_per_sec,
            burst,
            expires_at,
        });
        // Burst capacity shrinking takes effect immediately.
        if bucket.tokens > burst {
            bucket.tokens = burst;
        }
    }

    pub fn clear_override(&self, identifier: &str) {
        if let Some(bucket) = self.buckets.write().get_mut(identifier) {
            bucket.over = None;
        }
    }

    fn effective_rate_burst(bucket: &mut Bucket, default_rate: f64, default_burst: f64) -> (f64, f64) {
        match bucket.over {
            Some(over) if over.expires_at.map(|e| e > Utc::now()).unwrap_or(true) => {
                (over.rate_per_sec, over.burst)
            }
            Some(_) => {
                bucket.over = None;
                (default_rate, default_burst)
            }
            None => (default_rate, default_burst),
        }
    }

    /// Check and consume one token for `identifier`. Does not consult the
    /// whitelist/blacklist — callers enforce that precedence before
    /// reaching the bucket.
    pub fn check(&self, identifier: &str) -> Decision {
        let mut buckets = self.buckets.write();
        let bucket = buckets
            .entry(identifier.to_owned())
            .or_insert_with(|| Bucket::new(self.default_burst));

        let (rate, burst) = Self::effective_rate_burst(bucket, self.default_rate, self.default_burst);

        let now = Utc::now();
        let elapsed = (now - bucket.last_refill).num_milliseconds().max(0) as f64 / 1000.0;
        bucket.tokens = (bucket.tokens + elapsed * rate).min(burst);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            bucket.allowed += 1;
            Decision {
                allowed: true,
                limit: burst as u32,
                remaining: bucket.tokens as u32,
                reset_after_secs: ((burst - bucket.tokens) / rate).ceil().max(0.0) as u64,
                retry_after_secs: None,
            }
        } else {
            bucket.denied += 1;
            if bucket.violations.len() >= MAX_VIOLATION_HISTORY {
                bucket.violations.pop_front();
            }
            bucket.violations.push_back(now);
            let retry_after = ((1.0 - bucket.tokens) / rate).ceil().max(1.0) as u64;
            Decision {
                allowed: false,
                limit: burst as u32,
                remaining: 0,
                reset_after_secs: retry_after,
                retry_after_secs: Some(retry_after),
            }
        }
    }

    pub fn violation_count(&self, identifier: &str) -> usize {
        self.buckets
            .read()
            .get(identifier)
            .map(|b| b.violations.len())
            .unwrap_or(0)
    }

    pub fn stats(&self, identifier: &str) -> Option<(u64, u64)> {
        self.buckets
            .read()
            .get(identifier)
            .map(|b| (b.allowed, b.denied))
    }

    /// Drop buckets that have seen no activity for `idle_secs`. Run
    /// periodically by the supervisor's background sweeper so long-lived
    /// deployments don't accumulate one bucket per IP forever.
    pub fn sweep_idle(&self, idle_secs: i64) -> usize {
        let now = Utc::now();
        let mut buckets = self.buckets.write();
        let before = buckets.len();
        buckets.retain(|_, b| (now - b.last_refill).num_seconds() < idle_secs);
        before - buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_burst_then_denies() {
        let limiter = RateLimiter::new(1, 3);
        for _ in 0..3 {
            assert!(limiter.check("a").allowed);
        }
        let decision = limiter.check("a");
        assert!(!decision.allowed);
        assert!(decision.retry_after_secs.is_some());
    }

    #[test]
    fn identifiers_are_isolated() {
        let limiter = RateLimiter::new(1, 1);
        assert!(limiter.check("a").allowed);
        assert!(limiter.check("b").allowed);
        assert!(!limiter.check("a").allowed);
    }

    #[test]
    fn override_lowers_burst_immediately() {
        let limiter = RateLimiter::new(10, 10);
        limiter.check("a");
        limiter.set_override("a", 1.0, 1.0, None);
        let decision = limiter.check("a");
        assert!(decision.remaining <= 1);
    }

    #[test]
    fn expired_override_falls_back_to_default() {
        let limiter = RateLimiter::new(5, 5);
        limiter.set_override("a", 1.0, 1.0, Some(-1));
        let decision = limiter.check("a");
        assert_eq!(decision.limit, 5);
    }

    #[test]
    fn whitelist_and_blacklist_membership() {
        let limiter = RateLimiter::new(1, 1).with_lists(vec!["1.1.1.1".into()], vec!["2.2.2.2".into()]);
        assert!(limiter.is_whitelisted("1.1.1.1"));
        assert!(limiter.is_blacklisted("2.2.2.2"));
        assert!(!limiter.is_whitelisted("3.3.3.3"));
    }

    #[test]
    fn denied_requests_accumulate_violation_history() {
        let limiter = RateLimiter::new(1, 1);
        limiter.check("a");
        limiter.check("a");
        limiter.check("a");
        assert!(limiter.violation_count("a") >= 1);
    }

    #[test]
    fn sweep_idle_removes_stale_buckets() {
        let limiter = RateLimiter::new(1, 1);
        limiter.check("a");
        let removed = limiter.sweep_idle(-1);
        assert_eq!(removed, 1);
    }
}
