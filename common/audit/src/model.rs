use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuditActor {
    pub id: Option<Uuid>,
    pub name: Option<String>,
    pub email: Option<String>,
    /// True only for a platform admin acting across tenants via
    /// `X-Acting-Tenant`. Carried on the entry so a reviewer can filter for
    /// cross-tenant actions without re-deriving it from role history.
    pub cross_tenant: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Denied,
    Error,
}

/// One append-only record. `before`/`after` hold the pre/post handler state
/// as JSON, already passed through the redactor — nothing sensitive is
/// written here, ever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub actor: AuditActor,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<Uuid>,
    pub outcome: AuditOutcome,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    pub trace_id: Option<Uuid>,
    pub detail: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

pub struct AuditEntryBuilder {
    tenant_id: Uuid,
    actor: AuditActor,
    action: String,
    resource_type: String,
    resource_id: Option<Uuid>,
    outcome: AuditOutcome,
    before: Option<serde_json::Value>,
    after: Option<serde_json::Value>,
    trace_id: Option<Uuid>,
    detail: Option<String>,
}

impl AuditEntryBuilder {
    pub fn new(
        tenant_id: Uuid,
        actor: AuditActor,
        action: impl Into<String>,
        resource_type: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            tenant_id,
            actor,
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: None,
            outcome,
            before: None,
            after: None,
            trace_id: None,
            detail: None,
        }
    }

    pub fn resource_id(mut self, id: Uuid) -> Self {
        self.resource_id = Some(id);
        self
    }

    pub fn before(mut self, value: serde_json::Value) -> Self {
        self.before = Some(crate::redact::redact(value));
        self
    }

    pub fn after(mut self, value: serde_json::Value) -> Self {
        self.after = Some(crate::redact::redact(value));
        self
    }

    pub fn trace_id(mut self, trace_id: Uuid) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn build(self) -> AuditEntry {
        AuditEntry {
            id: Uuid::new_v4(),
            tenant_id: self.tenant_id,
            actor: self.actor,
            action: self.action,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            outcome: self.outcome,
            before: self.before,
            after: self.after,
            trace_id: self.trace_id,
            detail: self.detail,
            occurred_at: Utc::now(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit store error: {0}")]
    Store(String),
}

pub type AuditResult<T> = Result<T, AuditError>;
