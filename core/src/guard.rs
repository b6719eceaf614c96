//! Identity is resolved by `Identity`'s own extractor (`eduhub_auth`);
//! tenant binding and the permission check are wired here instead because
//! both need a route's own action/resource names, which a global
//! middleware layer has no way to know. Handlers call `authorize` once
//! they have an `Identity` argument and before touching the repository
//! layer.

use axum::http::HeaderMap;
use eduhub_audit::AuditOutcome;
use eduhub_auth::Identity;
use eduhub_http_errors::ApiError;
use eduhub_security::{audit_acting_tenant_use, audit_denied_access, bind_tenant, TenantContext};
use uuid::Uuid;

use crate::state::AppState;

pub struct AuthorizedRequest {
    pub identity: Identity,
    pub tenant: TenantContext,
}

/// Bind the request's tenant, check the permission, and audit any denial,
/// in that order. Every 403 this function produces — a tenant-binder
/// rejection or a permission-check denial — is audited before the error
/// returns, not only cross-tenant platform-admin overrides: an attempted
/// override is audited via `audit_acting_tenant_use` regardless of
/// outcome, and a same-tenant denial is audited via `audit_denied_access`.
pub async fn authorize(
    state: &AppState,
    identity: Identity,
    path_tenant: Option<Uuid>,
    headers: &HeaderMap,
    action: &str,
    resource: &str,
) -> Result<AuthorizedRequest, ApiError> {
    let tenant = match bind_tenant(&identity, path_tenant, headers) {
        Ok(tenant) => tenant,
        Err(err) => {
            audit_denied_access(
                state.audit_sink.as_ref(),
                &state.metrics,
                identity.tenant_id,
                &identity,
                action,
                resource,
            )
            .await;
            return Err(err.into());
        }
    };

    let permission_result = state
        .permissions
        .check(identity.subject, action, resource, Some(identity.expires_at))
        .await;

    if tenant.acting_as_other_tenant {
        audit_acting_tenant_use(
            state.audit_sink.as_ref(),
            &state.metrics,
            &tenant,
            &identity,
            action,
            if permission_result.is_ok() { AuditOutcome::Success } else { AuditOutcome::Denied },
        )
        .await;
    } else if permission_result.is_err() {
        audit_denied_access(
            state.audit_sink.as_ref(),
            &state.metrics,
            tenant.tenant_id,
            &identity,
            action,
            resource,
        )
        .await;
    }

    permission_result?;

    Ok(AuthorizedRequest { identity, tenant })
}
