//! Per-key token-bucket rate limiting with bounded resident memory: the
//! background sweeper guarantees `O(active_keys)` entries by evicting
//! buckets that have gone idle, rather than letting the registry grow
//! without bound under IP churn.

mod limiter;
mod sweeper;

pub use limiter::{RateDecision, RateLimitClass, RateLimiter};
pub use sweeper::Sweeper;
