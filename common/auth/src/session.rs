use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};

/// A resolved server-held session: the counterpart to `Claims` for the
/// cookie-backed identity path. Both paths converge on `Identity`.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_id: Uuid,
    pub subject: Uuid,
    pub tenant_id: Uuid,
    pub roles: Vec<String>,
    pub expires_at: DateTime<Utc>,
}

/// Opaque session token handed to the browser in a cookie. Only its hash is
/// ever stored; the plaintext never touches the database or a log line.
pub struct IssuedSession {
    pub token: String,
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { ttl: Duration::hours(12) }
    }
}

/// Postgres-backed session store. Every login or refresh rotates the
/// session: the old token is deleted and a new one issued under a new
/// session id, per the fixation-prevention requirement — a token captured
/// before authentication (e.g. pre-login session fixation, or a leaked
/// refresh token) stops being usable the instant it is exchanged.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
    config: SessionConfig,
}

impl PgSessionStore {
    pub fn new(pool: PgPool, config: SessionConfig) -> Self {
        Self { pool, config }
    }

    /// Start a brand new session for a just-authenticated subject.
    pub async fn issue(
        &self,
        subject: Uuid,
        tenant_id: Uuid,
        roles: Vec<String>,
    ) -> AuthResult<IssuedSession> {
        let token = generate_token();
        let token_hash = hash_token(&token);
        let session_id = Uuid::new_v4();
        let now = Utc::now();
        let expires_at = now + self.config.ttl;

        sqlx::query(
            "INSERT INTO auth_sessions (session_id, subject, tenant_id, roles, token_hash, created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(session_id)
        .bind(subject)
        .bind(tenant_id)
        .bind(&roles)
        .bind(&token_hash)
        .bind(now)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|err| AuthError::Store(err.to_string()))?;

        Ok(IssuedSession { token, session_id, expires_at })
    }

    /// Resolve a presented session cookie to its record, without rotating
    /// it. Used on every authenticated request.
    pub async fn resolve(&self, token: &str) -> AuthResult<SessionRecord> {
        let token_hash = hash_token(token);
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT session_id, subject, tenant_id, roles, expires_at FROM auth_sessions WHERE token_hash = $1",
        )
        .bind(&token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| AuthError::Store(err.to_string()))?;

        let row = row.ok_or(AuthError::SessionExpired)?;
        if row.expires_at <= Utc::now() {
            return Err(AuthError::SessionExpired);
        }

        Ok(row.into())
    }

    /// Rotate a session: atomically delete the presented token and issue a
    /// fresh one for the same subject. Called on every explicit refresh,
    /// and always on login even if a prior session cookie was presented.
    pub async fn rotate(&self, token: &str) -> AuthResult<IssuedSession> {
        let token_hash = hash_token(token);
        let mut tx = self.pool.begin().await.map_err(|err| AuthError::Store(err.to_string()))?;

        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT session_id, subject, tenant_id, roles, expires_at FROM auth_sessions WHERE token_hash = $1 FOR UPDATE",
        )
        .bind(&token_hash)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|err| AuthError::Store(err.to_string()))?;

        let row = row.ok_or(AuthError::SessionExpired)?;

        sqlx::query("DELETE FROM auth_sessions WHERE session_id = $1")
            .bind(row.session_id)
            .execute(&mut *tx)
            .await
            .map_err(|err| AuthError::Store(err.to_string()))?;

        if row.expires_at <= Utc::now() {
            tx.commit().await.map_err(|err| AuthError::Store(err.to_string()))?;
            return Err(AuthError::SessionExpired);
        }

        let new_token = generate_token();
        let new_token_hash = hash_token(&new_token);
        let new_session_id = Uuid::new_v4();
        let now = Utc::now();
        let expires_at = now + self.config.ttl;

        sqlx::query(
            "INSERT INTO auth_sessions (session_id, subject, tenant_id, roles, token_hash, created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(new_session_id)
        .bind(row.subject)
        .bind(row.tenant_id)
        .bind(&row.roles)
        .bind(&new_token_hash)
        .bind(now)
        .bind(expires_at)
        .execute(&mut *tx)
        .await
        .map_err(|err| AuthError::Store(err.to_string()))?;

        tx.commit().await.map_err(|err| AuthError::Store(err.to_string()))?;

        Ok(IssuedSession { token: new_token, session_id: new_session_id, expires_at })
    }

    /// Revoke a session outright, e.g. on logout.
    pub async fn revoke(&self, token: &str) -> AuthResult<()> {
        let token_hash = hash_token(token);
        sqlx::query("DELETE FROM auth_sessions WHERE token_hash = $1")
            .bind(&token_hash)
            .execute(&self.pool)
            .await
            .map_err(|err| AuthError::Store(err.to_string()))?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    session_id: Uuid,
    subject: Uuid,
    tenant_id: Uuid,
    roles: Vec<String>,
    expires_at: DateTime<Utc>,
}

impl From<SessionRow> for SessionRecord {
    fn from(row: SessionRow) -> Self {
        Self {
            session_id: row.session_id,
            subject: row.subject,
            tenant_id: row.tenant_id,
            roles: row.roles,
            expires_at: row.expires_at,
        }
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    format!("{}.{}", Uuid::new_v4(), URL_SAFE_NO_PAD.encode(bytes))
}

fn hash_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_unique_and_not_trivially_guessable() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert!(a.len() > 32);
    }

    #[test]
    fn hashing_is_deterministic() {
        let token = generate_token();
        assert_eq!(hash_token(&token), hash_token(&token));
    }
}
