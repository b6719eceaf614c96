use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use eduhub_observability::CoreMetrics;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::SecurityError;

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct CacheKey {
    subject: Uuid,
    action: String,
    resource: String,
}

struct CacheEntry {
    allowed: bool,
    expires_at: Instant,
    epoch: u64,
}

#[derive(Deserialize)]
struct PolicyDecision {
    allowed: bool,
}

/// Checks `(subject, action, resource)` against the external policy store,
/// caching results with a TTL clamped to the caller's session lifetime so
/// a cached grant never outlives the session that earned it. Cache
/// invalidation on role change is lazy: `bump_epoch` increments a
/// per-subject counter, and every cached entry is checked against the
/// current epoch before being trusted, rather than being actively swept.
pub struct PermissionChecker {
    client: reqwest::Client,
    base_url: String,
    configured_ttl: Duration,
    /// Actions permitted to fail open (return `Allowed`) when the policy
    /// store cannot be reached. Every unlisted action — and every mutating
    /// one in particular — fails closed (denied) on a store outage.
    fail_open_actions: HashSet<String>,
    cache: Mutex<HashMap<CacheKey, CacheEntry>>,
    epochs: Mutex<HashMap<Uuid, u64>>,
    metrics: CoreMetrics,
}

impl PermissionChecker {
    pub fn new(
        base_url: impl Into<String>,
        configured_ttl: Duration,
        fail_open_actions: HashSet<String>,
        metrics: CoreMetrics,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            configured_ttl,
            fail_open_actions,
            cache: Mutex::new(HashMap::new()),
            epochs: Mutex::new(HashMap::new()),
            metrics,
        }
    }

    /// Invalidate a subject's cached decisions, e.g. because their roles
    /// just changed. Existing entries aren't removed; they simply stop
    /// being honored the next time they're looked up.
    pub fn bump_epoch(&self, subject: Uuid) {
        let mut epochs = self.epochs.lock().expect("epoch map poisoned");
        *epochs.entry(subject).or_insert(0) += 1;
    }

    fn current_epoch(&self, subject: Uuid) -> u64 {
        *self.epochs.lock().expect("epoch map poisoned").get(&subject).unwrap_or(&0)
    }

    pub async fn check(
        &self,
        subject: Uuid,
        action: &str,
        resource: &str,
        session_expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), SecurityError> {
        let key = CacheKey { subject, action: action.to_string(), resource: resource.to_string() };
        let epoch = self.current_epoch(subject);

        if let Some(allowed) = self.cached(&key, epoch) {
            self.metrics.permission_cache_hits_total.inc();
            return self.to_result(allowed, action, resource);
        }
        self.metrics.permission_cache_misses_total.inc();

        let allowed = match self.query_store(subject, action, resource).await {
            Ok(decision) => decision,
            Err(err) => {
                tracing::warn!(error = %err, action, resource, "policy store unreachable");
                if self.fail_open_actions.contains(action) {
                    true
                } else {
                    return Err(SecurityError::PolicyStoreUnavailable(err));
                }
            }
        };

        let ttl = clamp_ttl(self.configured_ttl, session_expires_at);
        self.cache.lock().expect("cache poisoned").insert(
            key,
            CacheEntry { allowed, expires_at: Instant::now() + ttl, epoch },
        );

        self.to_result(allowed, action, resource)
    }

    fn cached(&self, key: &CacheKey, current_epoch: u64) -> Option<bool> {
        let cache = self.cache.lock().expect("cache poisoned");
        let entry = cache.get(key)?;
        if entry.epoch != current_epoch || entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.allowed)
    }

    async fn query_store(&self, subject: Uuid, action: &str, resource: &str) -> Result<bool, String> {
        let response = self
            .client
            .get(format!("{}/v1/check", self.base_url))
            .query(&[("subject", subject.to_string()), ("action", action.to_string()), ("resource", resource.to_string())])
            .send()
            .await
            .map_err(|err| err.to_string())?;

        if !response.status().is_success() {
            return Err(format!("policy store returned {}", response.status()));
        }

        let decision: PolicyDecision = response.json().await.map_err(|err| err.to_string())?;
        Ok(decision.allowed)
    }

    /// Round-trips a request against the policy store for readiness checks.
    /// Deliberately bypasses the decision cache: a cached `Allowed` from
    /// five minutes ago says nothing about whether the store answers now.
    pub async fn health_check(&self) -> bool {
        self.client
            .get(format!("{}/healthz", self.base_url))
            .send()
            .await
            .map(|resp| resp.status().is_success())
            .unwrap_or(false)
    }

    fn to_result(&self, allowed: bool, action: &str, resource: &str) -> Result<(), SecurityError> {
        if allowed {
            Ok(())
        } else {
            Err(SecurityError::Forbidden { action: action.to_string(), resource: resource.to_string() })
        }
    }
}

fn clamp_ttl(configured: Duration, session_expires_at: Option<DateTime<Utc>>) -> Duration {
    let Some(expires_at) = session_expires_at else { return configured };
    let remaining = expires_at.signed_duration_since(Utc::now());
    let remaining = remaining.to_std().unwrap_or(Duration::ZERO);
    configured.min(remaining)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_is_clamped_to_session_lifetime() {
        let configured = Duration::from_secs(600);
        let expires_soon = Utc::now() + chrono::Duration::seconds(30);
        let clamped = clamp_ttl(configured, Some(expires_soon));
        assert!(clamped <= Duration::from_secs(30));
    }

    #[test]
    fn ttl_is_unclamped_without_a_session() {
        let configured = Duration::from_secs(600);
        assert_eq!(clamp_ttl(configured, None), configured);
    }

    #[test]
    fn expired_session_clamps_to_zero() {
        let configured = Duration::from_secs(600);
        let already_expired = Utc::now() - chrono::Duration::seconds(5);
        assert_eq!(clamp_ttl(configured, Some(already_expired)), Duration::ZERO);
    }
}
