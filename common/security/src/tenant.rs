use axum::http::HeaderMap;
use eduhub_audit::{AuditEntryBuilder, AuditOutcome, AuditSink};
use eduhub_auth::{roles::ROLE_PLATFORM_ADMIN, Identity};
use uuid::Uuid;

use crate::error::SecurityError;

pub const ACTING_TENANT_HEADER: &str = "X-Acting-Tenant";

/// The tenant a request is scoped to, after reconciling every
/// tenant-bearing source on the request: the identity's own tenant, any
/// tenant named in the path, and an optional `X-Acting-Tenant` override.
#[derive(Debug, Clone, Copy)]
pub struct TenantContext {
    pub tenant_id: Uuid,
    pub acting_as_other_tenant: bool,
}

/// Reconcile every tenant-bearing source on a request into one
/// `TenantContext`, or fail. `path_tenant` is whatever tenant id, if any,
/// the route itself names (e.g. `/api/tenants/{tenant_id}/...`).
///
/// Platform admins are the only identities allowed to disagree with the
/// path: they must present `X-Acting-Tenant` naming the tenant they intend
/// to act as, and every such request is flagged for audit by the caller
/// (the entry itself is written separately, once the handler result is
/// known, via `audit_acting_tenant_use`).
pub fn bind_tenant(
    identity: &Identity,
    path_tenant: Option<Uuid>,
    headers: &HeaderMap,
) -> Result<TenantContext, SecurityError> {
    let acting_header = headers
        .get(ACTING_TENANT_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    if let Some(raw) = acting_header {
        if !identity.has_role(ROLE_PLATFORM_ADMIN) {
            return Err(SecurityError::ActingTenantNotPermitted);
        }
        let acting_tenant = Uuid::parse_str(raw).map_err(|_| SecurityError::MissingTenant)?;
        return Ok(TenantContext { tenant_id: acting_tenant, acting_as_other_tenant: true });
    }

    match path_tenant {
        Some(requested) if requested != identity.tenant_id => {
            Err(SecurityError::TenantMismatch { path: requested, identity: identity.tenant_id })
        }
        _ => Ok(TenantContext { tenant_id: identity.tenant_id, acting_as_other_tenant: false }),
    }
}

/// Record the cross-tenant audit entry a successful `X-Acting-Tenant`
/// override requires. Called after the binder accepts the override and
/// the handler has run, so the entry can carry the outcome.
pub async fn audit_acting_tenant_use(
    sink: &dyn AuditSink,
    metrics: &eduhub_observability::CoreMetrics,
    context: &TenantContext,
    identity: &Identity,
    action: &str,
    outcome: AuditOutcome,
) {
    if !context.acting_as_other_tenant {
        return;
    }
    let entry = AuditEntryBuilder::new(
        context.tenant_id,
        eduhub_audit::AuditActor {
            id: Some(identity.subject),
            name: None,
            email: None,
            cross_tenant: true,
        },
        action,
        "tenant_scope",
        outcome,
    )
    .detail(format!("platform admin {} acted as tenant {}", identity.subject, context.tenant_id))
    .build();

    eduhub_audit::record(sink, metrics, entry).await;
}

/// Record a denial that isn't a cross-tenant override: either the tenant
/// binder rejected the request outright (no path/identity tenant match,
/// or an unpermitted `X-Acting-Tenant` attempt) or the permission check
/// denied a same-tenant subject. `tenant_id` is the identity's own tenant
/// — the binder never established any other tenant as the request's
/// scope, so that's the tenant the denial is recorded against. Cross-tenant
/// overrides are covered by `audit_acting_tenant_use` instead, which
/// already records both outcomes for that path.
pub async fn audit_denied_access(
    sink: &dyn AuditSink,
    metrics: &eduhub_observability::CoreMetrics,
    tenant_id: Uuid,
    identity: &Identity,
    action: &str,
    resource: &str,
) {
    let entry = AuditEntryBuilder::new(
        tenant_id,
        eduhub_audit::AuditActor {
            id: Some(identity.subject),
            name: None,
            email: None,
            cross_tenant: false,
        },
        action,
        resource,
        AuditOutcome::Denied,
    )
    .build();

    eduhub_audit::record(sink, metrics, entry).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    fn identity(tenant_id: Uuid, roles: Vec<&str>) -> Identity {
        Identity {
            subject: Uuid::new_v4(),
            tenant_id,
            roles: roles.into_iter().map(str::to_string).collect(),
            session_id: None,
            expires_at: chrono::Utc::now() + chrono::Duration::hours(1),
        }
    }

    #[test]
    fn matching_path_tenant_is_accepted() {
        let tenant = Uuid::new_v4();
        let id = identity(tenant, vec!["faculty"]);
        let ctx = bind_tenant(&id, Some(tenant), &HeaderMap::new()).unwrap();
        assert_eq!(ctx.tenant_id, tenant);
        assert!(!ctx.acting_as_other_tenant);
    }

    #[test]
    fn mismatched_path_tenant_is_rejected() {
        let id = identity(Uuid::new_v4(), vec!["faculty"]);
        let other = Uuid::new_v4();
        let err = bind_tenant(&id, Some(other), &HeaderMap::new()).unwrap_err();
        assert!(matches!(err, SecurityError::TenantMismatch { .. }));
    }

    #[test]
    fn acting_tenant_header_requires_platform_admin_role() {
        let id = identity(Uuid::new_v4(), vec!["admin"]);
        let mut headers = HeaderMap::new();
        headers.insert(ACTING_TENANT_HEADER, HeaderValue::from_str(&Uuid::new_v4().to_string()).unwrap());
        let err = bind_tenant(&id, None, &headers).unwrap_err();
        assert!(matches!(err, SecurityError::ActingTenantNotPermitted));
    }

    #[test]
    fn platform_admin_may_cross_tenants_via_header() {
        let id = identity(Uuid::new_v4(), vec!["platform_admin"]);
        let target = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(ACTING_TENANT_HEADER, HeaderValue::from_str(&target.to_string()).unwrap());
        let ctx = bind_tenant(&id, None, &headers).unwrap();
        assert_eq!(ctx.tenant_id, target);
        assert!(ctx.acting_as_other_tenant);
    }
}
