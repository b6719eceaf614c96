use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::limiter::RateLimiter;

/// Drives `RateLimiter::sweep_once` on a fixed interval. Must be started
/// and stopped explicitly: a sweeper with no way to stop is a leaked task,
/// which is a defect in this design, not a minor inconvenience.
pub struct Sweeper {
    limiter: Arc<RateLimiter>,
    interval: Duration,
    idle_threshold: Duration,
}

impl Sweeper {
    pub fn new(limiter: Arc<RateLimiter>, interval: Duration, idle_threshold: Duration) -> Self {
        Self { limiter, interval, idle_threshold }
    }

    /// Run until `shutdown` is cancelled. On cancellation, exits within one
    /// sweep interval rather than mid-sweep — the current pass (if any) is
    /// always allowed to finish.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("rate limit sweeper shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    let evicted = self.limiter.sweep_once(self.idle_threshold);
                    if evicted > 0 {
                        tracing::debug!(evicted, "rate limit sweep evicted idle buckets");
                    }
                }
            }
        }
    }
}
