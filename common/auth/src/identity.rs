use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header::AUTHORIZATION, request::Parts};
use axum_extra::extract::cookie::CookieJar;
use eduhub_audit::{AuditActor, AuditEntryBuilder, AuditOutcome, AuditSink};
use eduhub_crypto::{credential_fingerprint, SigningSecret};
use eduhub_observability::CoreMetrics;
use uuid::Uuid;

use eduhub_http_errors::ApiError;

use crate::claims::{unverified_tenant_hint, Claims};
use crate::error::AuthError;
use crate::session::{PgSessionStore, SessionRecord};
use crate::verifier::JwtVerifier;

pub const SESSION_COOKIE_NAME: &str = "eduhub_session";

/// The one shape every downstream handler works with, regardless of which
/// credential format the caller presented. Resolving to `Identity` is the
/// entire point of the dual-format verifier: nothing past this extractor
/// ever branches on "was this a cookie or a bearer token".
#[derive(Debug, Clone)]
pub struct Identity {
    pub subject: Uuid,
    pub tenant_id: Uuid,
    pub roles: Vec<String>,
    pub session_id: Option<Uuid>,
    /// When this identity's credential expires, bearer token or session
    /// alike. The permission checker clamps its cache TTL to this so a
    /// cached grant never outlives the credential that earned it.
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

impl Identity {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|value| value == role)
    }
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            subject: claims.subject,
            tenant_id: claims.tenant_id,
            roles: claims.roles,
            session_id: None,
            expires_at: claims.expires_at,
        }
    }
}

impl From<SessionRecord> for Identity {
    fn from(session: SessionRecord) -> Self {
        Self {
            subject: session.subject,
            tenant_id: session.tenant_id,
            roles: session.roles,
            session_id: Some(session.session_id),
            expires_at: session.expires_at,
        }
    }
}

/// Axum extractor state every handler needing identity depends on: a JWT
/// verifier for bearer tokens and a session store for the cookie path.
/// Exactly one of the two credential formats is tried based on what the
/// request actually presents — a request is never required to offer both.
pub struct IdentityResolver {
    pub jwt: Arc<JwtVerifier>,
    pub sessions: PgSessionStore,
    pub audit_sink: Arc<dyn AuditSink>,
    pub metrics: CoreMetrics,
    /// HMAC key for `credential_fingerprint`. Doesn't need to be the JWT
    /// verification key — any stable server-side secret works, since the
    /// fingerprint only needs to be irreversible and consistent across
    /// repeated attempts with the same credential.
    pub fingerprint_secret: SigningSecret,
}

impl IdentityResolver {
    /// Records an "auth failure" entry carrying a non-reversible fingerprint
    /// of the offered credential, never the credential itself. Tenant
    /// attribution is best-effort: a bearer token's unverified `tid` claim
    /// is used when it parses, `Uuid::nil()` otherwise — this is audit
    /// correlation, never authorization.
    async fn audit_failure(&self, credential: &str) {
        record_auth_failure(self.audit_sink.as_ref(), &self.metrics, &self.fingerprint_secret, credential).await;
    }
}

async fn record_auth_failure(
    audit_sink: &dyn AuditSink,
    metrics: &CoreMetrics,
    fingerprint_secret: &SigningSecret,
    credential: &str,
) {
    let tenant_id = unverified_tenant_hint(credential).unwrap_or_else(Uuid::nil);
    let fingerprint = credential_fingerprint(fingerprint_secret, credential);

    let entry = AuditEntryBuilder::new(
        tenant_id,
        AuditActor::default(),
        "auth:failure",
        "identity",
        AuditOutcome::Denied,
    )
    .detail(format!("credential_fingerprint={fingerprint}"))
    .build();

    eduhub_audit::record(audit_sink, metrics, entry).await;
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    IdentityResolver: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let resolver = IdentityResolver::from_ref(state);

        let jar = CookieJar::from_headers(&parts.headers);
        if let Some(cookie) = jar.get(SESSION_COOKIE_NAME) {
            let token = cookie.value().to_string();
            return match resolver.sessions.resolve(&token).await {
                Ok(session) => Ok(session.into()),
                Err(err) => {
                    resolver.audit_failure(&token).await;
                    Err(err.into())
                }
            };
        }

        if let Some(header_value) = parts.headers.get(AUTHORIZATION) {
            let token = match parse_bearer(header_value) {
                Ok(token) => token,
                Err(err) => {
                    let raw = header_value.to_str().unwrap_or("<invalid-utf8-authorization>");
                    resolver.audit_failure(raw).await;
                    return Err(err.into());
                }
            };

            return match resolver.jwt.verify(&token) {
                Ok(claims) => Ok(claims.into()),
                Err(err) => {
                    resolver.audit_failure(&token).await;
                    Err(err.into())
                }
            };
        }

        Err(AuthError::NoCredential.into())
    }
}

fn parse_bearer(value: &axum::http::HeaderValue) -> Result<String, AuthError> {
    let raw = value
        .to_str()
        .map_err(|_| AuthError::InvalidAuthorization)?
        .trim();

    let token = raw
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthorization)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::InvalidAuthorization);
    }

    Ok(token.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use eduhub_audit::InMemoryAuditSink;
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims<'a> {
        tid: &'a str,
    }

    #[tokio::test]
    async fn auth_failure_is_recorded_with_a_fingerprint_not_the_credential() {
        let sink = InMemoryAuditSink::default();
        let metrics = CoreMetrics::new();
        let secret = SigningSecret::generate();

        record_auth_failure(&sink, &metrics, &secret, "Bearer some-offered-token").await;

        let stored = sink.entries().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].action, "auth:failure");
        assert_eq!(stored[0].outcome, AuditOutcome::Denied);
        let detail = stored[0].detail.as_ref().unwrap();
        assert!(detail.starts_with("credential_fingerprint="));
        assert!(!detail.contains("some-offered-token"));
    }

    #[test]
    fn unverified_tenant_hint_reads_the_tid_claim_without_checking_the_signature() {
        let tenant_id = Uuid::new_v4();
        let tid = tenant_id.to_string();
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some("any".into());
        let token = encode(
            &header,
            &TestClaims { tid: &tid },
            &EncodingKey::from_secret(b"a-key-the-reader-never-checks-at-all"),
        )
        .unwrap();

        assert_eq!(unverified_tenant_hint(&token), Some(tenant_id));
    }

    #[test]
    fn unverified_tenant_hint_is_none_for_garbage_input() {
        assert_eq!(unverified_tenant_hint("not-a-jwt-at-all"), None);
    }
}
