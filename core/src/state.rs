use std::sync::Arc;

use axum::extract::FromRef;
use eduhub_audit::AuditSink;
use eduhub_auth::{IdentityResolver, JwtVerifier, PgSessionStore};
use eduhub_crypto::SigningSecret;
use eduhub_observability::CoreMetrics;
use eduhub_pool::Pools;
use eduhub_ratelimit::RateLimiter;
use eduhub_security::PermissionChecker;
use eduhub_wshub::Hub;

/// Everything a handler or middleware layer needs, shared behind cheap
/// clones. Every field is itself an `Arc` or an internally-pooled handle,
/// so cloning `AppState` per request never copies meaningful state.
#[derive(Clone)]
pub struct AppState {
    pub pools: Pools,
    pub jwt_verifier: Arc<JwtVerifier>,
    pub sessions: PgSessionStore,
    pub jwt_signing_secret: SigningSecret,
    pub permissions: Arc<PermissionChecker>,
    pub rate_limiter: Arc<RateLimiter>,
    pub audit_sink: Arc<dyn AuditSink>,
    pub ws_hub: Arc<Hub>,
    pub metrics: CoreMetrics,
    pub cors_allowed_origins: Arc<Vec<String>>,
}

impl FromRef<AppState> for IdentityResolver {
    fn from_ref(state: &AppState) -> Self {
        IdentityResolver {
            jwt: state.jwt_verifier.clone(),
            sessions: state.sessions.clone(),
            audit_sink: state.audit_sink.clone(),
            metrics: state.metrics.clone(),
            fingerprint_secret: state.jwt_signing_secret.clone(),
        }
    }
}
