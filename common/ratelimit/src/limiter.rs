use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use eduhub_observability::CoreMetrics;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitClass {
    pub capacity: u32,
    pub refill_per_sec: f64,
}

impl RateLimitClass {
    /// The sweeper's eviction horizon for buckets in this class: the time
    /// it takes to refill from empty to full, or the configured idle
    /// threshold, whichever is larger.
    fn idle_horizon(&self, idle_threshold: Duration) -> Duration {
        if self.refill_per_sec <= 0.0 {
            return idle_threshold;
        }
        let full_refill = Duration::from_secs_f64(self.capacity as f64 / self.refill_per_sec);
        full_refill.max(idle_threshold)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    pub allowed: bool,
    pub retry_after: Option<Duration>,
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
    class: String,
}

/// Per-key token bucket registry. Same-key `allow` calls serialize through
/// that key's own lock; different keys never contend, because the global
/// map is only write-locked to insert a brand new key or to evict during a
/// sweep.
pub struct RateLimiter {
    classes: HashMap<String, RateLimitClass>,
    buckets: RwLock<HashMap<String, Arc<Mutex<Bucket>>>>,
    metrics: CoreMetrics,
}

impl RateLimiter {
    pub fn new(classes: HashMap<String, RateLimitClass>, metrics: CoreMetrics) -> Self {
        Self { classes, buckets: RwLock::new(HashMap::new()), metrics }
    }

    /// Refill tokens proportional to elapsed time since the bucket's last
    /// refill, cap at capacity, decrement by 1, allow iff the result is
    /// non-negative. `retry_after` is the deficit divided by the refill
    /// rate — how long until there'd be enough tokens for this call to
    /// have succeeded.
    pub fn allow(&self, key: &str, class: &str) -> RateDecision {
        let Some(limits) = self.classes.get(class).copied() else {
            tracing::error!(class, "rate limit class not configured; denying by default");
            return RateDecision { allowed: false, retry_after: Some(Duration::from_secs(1)) };
        };

        let bucket = self.bucket_for(key, class, limits.capacity);
        let mut guard = bucket.lock().expect("bucket lock poisoned");

        let now = Instant::now();
        let elapsed = now.duration_since(guard.last_refill).as_secs_f64();
        let refilled = (guard.tokens + elapsed * limits.refill_per_sec).min(limits.capacity as f64);
        guard.last_refill = now;

        let remaining = refilled - 1.0;
        self.metrics.rate_limit_checks_total.with_label_values(&[class]).inc();

        if remaining >= 0.0 {
            guard.tokens = remaining;
            RateDecision { allowed: true, retry_after: None }
        } else {
            guard.tokens = refilled;
            self.metrics.rate_limit_rejections_total.with_label_values(&[class]).inc();
            let deficit = -remaining;
            let retry_after = Duration::from_secs_f64(deficit / limits.refill_per_sec);
            RateDecision { allowed: false, retry_after: Some(retry_after) }
        }
    }

    fn bucket_for(&self, key: &str, class: &str, capacity: u32) -> Arc<Mutex<Bucket>> {
        if let Some(existing) = self.buckets.read().expect("bucket map poisoned").get(key) {
            return existing.clone();
        }

        let mut write_guard = self.buckets.write().expect("bucket map poisoned");
        write_guard
            .entry(key.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(Bucket {
                    tokens: capacity as f64,
                    last_refill: Instant::now(),
                    class: class.to_string(),
                }))
            })
            .clone()
    }

    /// Evict buckets idle longer than their class's idle horizon. Returns
    /// the number of entries removed. Holds the registry exclusively for
    /// the duration of one pass, per the design's bounded-lock-hold
    /// requirement.
    pub(crate) fn sweep_once(&self, idle_threshold: Duration) -> usize {
        let now = Instant::now();
        let mut guard = self.buckets.write().expect("bucket map poisoned");
        let before = guard.len();

        guard.retain(|_, bucket| {
            let bucket = bucket.lock().expect("bucket lock poisoned");
            let horizon = self
                .classes
                .get(&bucket.class)
                .map(|limits| limits.idle_horizon(idle_threshold))
                .unwrap_or(idle_threshold);
            now.duration_since(bucket.last_refill) <= horizon
        });

        self.metrics.rate_limit_buckets_resident.set(guard.len() as i64);
        before - guard.len()
    }

    pub fn resident_count(&self) -> usize {
        self.buckets.read().expect("bucket map poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(capacity: u32, refill_per_sec: f64) -> RateLimiter {
        let mut classes = HashMap::new();
        classes.insert("test".to_string(), RateLimitClass { capacity, refill_per_sec });
        RateLimiter::new(classes, CoreMetrics::new())
    }

    #[test]
    fn allows_up_to_capacity_then_denies() {
        let limiter = limiter(3, 1.0);
        for _ in 0..3 {
            assert!(limiter.allow("k", "test").allowed);
        }
        let decision = limiter.allow("k", "test");
        assert!(!decision.allowed);
        assert!(decision.retry_after.is_some());
    }

    #[test]
    fn different_keys_have_independent_buckets() {
        let limiter = limiter(1, 1.0);
        assert!(limiter.allow("a", "test").allowed);
        assert!(limiter.allow("b", "test").allowed);
        assert!(!limiter.allow("a", "test").allowed);
    }

    #[test]
    fn unknown_class_is_denied_not_panicked() {
        let limiter = limiter(1, 1.0);
        let decision = limiter.allow("k", "nonexistent");
        assert!(!decision.allowed);
    }

    #[test]
    fn sweep_evicts_idle_buckets_but_keeps_active_ones() {
        let limiter = limiter(1, 1000.0); // full_refill horizon = 1ms
        limiter.allow("idle", "test");
        assert_eq!(limiter.resident_count(), 1);

        std::thread::sleep(Duration::from_millis(20));
        let evicted = limiter.sweep_once(Duration::from_millis(1));
        assert_eq!(evicted, 1);
        assert_eq!(limiter.resident_count(), 0);
    }
}
