use std::time::Duration;

use eduhub_observability::CoreMetrics;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

/// Periodically deletes audit entries older than the configured retention
/// window. Runs for the lifetime of the process; `shutdown` cancels the
/// sleep between sweeps so the process can exit promptly.
pub struct RetentionWorker {
    pool: PgPool,
    retention_days: u32,
    sweep_interval: Duration,
    metrics: CoreMetrics,
}

impl RetentionWorker {
    pub fn new(pool: PgPool, retention_days: u32, metrics: CoreMetrics) -> Self {
        Self {
            pool,
            retention_days,
            sweep_interval: Duration::from_secs(3600),
            metrics,
        }
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub async fn run(self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("audit retention worker shutting down");
                    return;
                }
                _ = tokio::time::sleep(self.sweep_interval) => {
                    self.sweep_once().await;
                }
            }
        }
    }

    async fn sweep_once(&self) {
        let cutoff_days = self.retention_days as f64;
        let result = sqlx::query(
            "DELETE FROM audit_entries WHERE occurred_at < now() - make_interval(days => $1)",
        )
        .bind(cutoff_days)
        .execute(&self.pool)
        .await;

        match result {
            Ok(outcome) => {
                tracing::info!(deleted = outcome.rows_affected(), "audit retention sweep complete");
                if let Ok(remaining) =
                    sqlx::query_scalar::<_, i64>("SELECT count(*) FROM audit_entries")
                        .fetch_one(&self.pool)
                        .await
                {
                    self.metrics.audit_entries_retained.set(remaining);
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "audit retention sweep failed");
            }
        }
    }
}
