//! Pairs an audit entry's "attempt" half, recorded before a handler does
//! its write, with the "outcome" half recorded once the handler knows how
//! things went. A panic unwinding through the handler skips `finish`
//! entirely — the attempt is still logged via `tracing::debug!` below, but
//! no audit row is written for it, since `PanicRecoveryLayer` has no
//! tenant or actor context to attribute one to.

use eduhub_audit::{AuditActor, AuditEntryBuilder, AuditOutcome};
use eduhub_auth::Identity;
use serde_json::Value;
use uuid::Uuid;

use crate::state::AppState;

pub struct AuditScope<'a> {
    state: &'a AppState,
    tenant_id: Uuid,
    actor: AuditActor,
    action: String,
    resource_type: &'static str,
    resource_id: Option<Uuid>,
    before: Option<Value>,
}

impl<'a> AuditScope<'a> {
    pub fn begin(
        state: &'a AppState,
        tenant_id: Uuid,
        identity: &Identity,
        action: impl Into<String>,
        resource_type: &'static str,
        resource_id: Option<Uuid>,
        before: Option<Value>,
    ) -> Self {
        let action = action.into();
        tracing::debug!(%tenant_id, subject = %identity.subject, %action, resource_type, "audit attempt recorded");
        Self {
            state,
            tenant_id,
            actor: AuditActor {
                id: Some(identity.subject),
                name: None,
                email: None,
                cross_tenant: identity.tenant_id != tenant_id,
            },
            action,
            resource_type,
            resource_id,
            before,
        }
    }

    pub async fn finish(self, outcome: AuditOutcome, after: Option<Value>) {
        let mut builder = AuditEntryBuilder::new(
            self.tenant_id,
            self.actor,
            self.action,
            self.resource_type,
            outcome,
        );
        if let Some(resource_id) = self.resource_id {
            builder = builder.resource_id(resource_id);
        }
        if let Some(before) = self.before {
            builder = builder.before(before);
        }
        if let Some(after) = after {
            builder = builder.after(after);
        }

        eduhub_audit::record(self.state.audit_sink.as_ref(), &self.state.metrics, builder.build()).await;
    }
}
