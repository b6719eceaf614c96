use async_trait::async_trait;
use eduhub_observability::CoreMetrics;
use sqlx::PgPool;

use crate::model::{AuditEntry, AuditError, AuditResult};

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn write(&self, entry: &AuditEntry) -> AuditResult<()>;
}

/// Writes audit entries to the relational store, same database as the
/// tenant data. Mutation-path callers write synchronously and block on
/// this; read-with-audit callers may choose to fire-and-forget.
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn write(&self, entry: &AuditEntry) -> AuditResult<()> {
        sqlx::query(
            "INSERT INTO audit_entries \
             (id, tenant_id, actor_id, actor_name, actor_email, actor_cross_tenant, \
              action, resource_type, resource_id, outcome, before_state, after_state, \
              trace_id, detail, occurred_at) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15)",
        )
        .bind(entry.id)
        .bind(entry.tenant_id)
        .bind(entry.actor.id)
        .bind(&entry.actor.name)
        .bind(&entry.actor.email)
        .bind(entry.actor.cross_tenant)
        .bind(&entry.action)
        .bind(&entry.resource_type)
        .bind(entry.resource_id)
        .bind(serde_json::to_string(&entry.outcome).unwrap_or_default())
        .bind(&entry.before)
        .bind(&entry.after)
        .bind(entry.trace_id)
        .bind(&entry.detail)
        .bind(entry.occurred_at)
        .execute(&self.pool)
        .await
        .map_err(|err| AuditError::Store(err.to_string()))?;

        Ok(())
    }
}

/// Write an entry, and if the write fails, log it as an error-class line
/// rather than propagating. The user-facing action that triggered this
/// audit entry must not fail because the audit store is unavailable;
/// availability of the primary action is chosen over durability of the
/// audit trail (compliance-critical deployments should swap this for a
/// sink that fails closed instead).
pub async fn record(sink: &dyn AuditSink, metrics: &CoreMetrics, entry: AuditEntry) {
    match sink.write(&entry).await {
        Ok(()) => {
            metrics.audit_writes_total.with_label_values(&["success"]).inc();
        }
        Err(err) => {
            metrics.audit_writes_total.with_label_values(&["failure"]).inc();
            metrics.audit_write_failures_total.inc();
            tracing::error!(
                error = %err,
                tenant_id = %entry.tenant_id,
                action = %entry.action,
                "failed to persist audit entry"
            );
        }
    }
}

/// An in-memory sink for tests: never touches a database, records
/// everything it's given.
#[derive(Default)]
pub struct InMemoryAuditSink {
    entries: tokio::sync::Mutex<Vec<AuditEntry>>,
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn write(&self, entry: &AuditEntry) -> AuditResult<()> {
        self.entries.lock().await.push(entry.clone());
        Ok(())
    }
}

impl InMemoryAuditSink {
    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().await.clone()
    }
}
