//! Typed configuration loader for every binary in the workspace. Follows
//! the same `from_env` + `anyhow::Context` shape used throughout the
//! services: required settings fail fast with a readable message, optional
//! settings fall back to a sane default.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use eduhub_crypto::SigningSecret;

/// Deployment environment. Several checks below (CORS wildcard, TLS on the
/// database DSN) are only fatal in `Prod` — local development stays
/// permissive so the inner loop doesn't need a throwaway cert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Self::Dev),
            "staging" => Ok(Self::Staging),
            "prod" | "production" => Ok(Self::Prod),
            other => bail!("Unsupported APP_ENV '{other}'. Use dev, staging, or prod."),
        }
    }

    pub fn is_prod(self) -> bool {
        matches!(self, Self::Prod)
    }
}

/// A single named rate-limit class: bucket capacity plus the rate at which
/// it refills. Distinct classes (e.g. `auth`, `api`, `websocket_upgrade`)
/// get distinct limits per the rate limiter's design.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitClass {
    pub capacity: u32,
    pub refill_per_sec: f64,
}

#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub environment: Environment,
    pub bind_addr: String,

    pub jwt_signing_secret: SigningSecret,
    pub jwt_algorithm: String,
    pub jwt_audience: String,
    pub jwks_url: Option<String>,

    pub database_url: String,

    pub cors_allowed_origins: Vec<String>,

    pub rate_limit_classes: HashMap<String, RateLimitClass>,
    pub rate_limit_idle_threshold: Duration,

    pub policy_store_url: String,
    pub cache_url: String,

    pub object_storage_endpoint: Option<String>,
    pub object_storage_access_key: Option<String>,
    pub object_storage_secret_key: Option<String>,

    pub outbound_gateway_url: Option<String>,
    pub outbound_gateway_api_key: Option<String>,

    pub audit_retention_days: u32,
}

impl CoreConfig {
    pub fn from_env() -> Result<Self> {
        let environment = env::var("APP_ENV")
            .ok()
            .map(|v| Environment::parse(&v))
            .transpose()?
            .unwrap_or(Environment::Dev);

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let jwt_signing_secret = load_signing_secret(environment)?;
        let jwt_algorithm = env::var("JWT_ALGORITHM").unwrap_or_else(|_| "HS256".to_string());
        let jwt_audience = env::var("JWT_AUDIENCE").context("JWT_AUDIENCE must be set")?;
        let jwks_url = env::var("JWKS_URL").ok().and_then(normalize_optional);

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        if environment.is_prod() && !database_url.contains("sslmode=require") {
            bail!("DATABASE_URL must include sslmode=require in prod");
        }

        let cors_allowed_origins = parse_origin_list(
            &env::var("CORS_ALLOWED_ORIGINS").unwrap_or_default(),
        );
        if environment.is_prod() && cors_allowed_origins.iter().any(|o| o == "*") {
            bail!("CORS_ALLOWED_ORIGINS may not contain '*' in prod");
        }

        let rate_limit_classes = parse_rate_limit_classes(
            &env::var("RATE_LIMIT_CLASSES").unwrap_or_else(|_| default_rate_limit_classes_spec()),
        )?;
        let rate_limit_idle_threshold = Duration::from_secs(
            env::var("RATE_LIMIT_IDLE_THRESHOLD_SECONDS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(300),
        );

        let policy_store_url =
            env::var("POLICY_STORE_URL").context("POLICY_STORE_URL must be set")?;
        let cache_url = env::var("CACHE_URL").context("CACHE_URL must be set")?;

        let object_storage_endpoint = env::var("OBJECT_STORAGE_ENDPOINT").ok().and_then(normalize_optional);
        let object_storage_access_key = env::var("OBJECT_STORAGE_ACCESS_KEY").ok().and_then(normalize_optional);
        let object_storage_secret_key = env::var("OBJECT_STORAGE_SECRET_KEY").ok().and_then(normalize_optional);
        if object_storage_endpoint.is_some()
            && (object_storage_access_key.is_none() || object_storage_secret_key.is_none())
        {
            bail!("OBJECT_STORAGE_ENDPOINT is set but access/secret key is missing");
        }

        // The outbound gateway (grade export, SSO provisioning, etc.) is
        // optional, but if a URL is configured the API key must be too: a
        // silently-unauthenticated outbound call is worse than refusing to
        // start.
        let outbound_gateway_url = env::var("OUTBOUND_GATEWAY_URL").ok().and_then(normalize_optional);
        let outbound_gateway_api_key = env::var("OUTBOUND_GATEWAY_API_KEY").ok().and_then(normalize_optional);
        if outbound_gateway_url.is_some() && outbound_gateway_api_key.is_none() {
            bail!("OUTBOUND_GATEWAY_URL is set but OUTBOUND_GATEWAY_API_KEY is missing");
        }

        let audit_retention_days = env::var("AUDIT_RETENTION_DAYS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(365);

        Ok(Self {
            environment,
            bind_addr,
            jwt_signing_secret,
            jwt_algorithm,
            jwt_audience,
            jwks_url,
            database_url,
            cors_allowed_origins,
            rate_limit_classes,
            rate_limit_idle_threshold,
            policy_store_url,
            cache_url,
            object_storage_endpoint,
            object_storage_access_key,
            object_storage_secret_key,
            outbound_gateway_url,
            outbound_gateway_api_key,
            audit_retention_days,
        })
    }
}

fn load_signing_secret(environment: Environment) -> Result<SigningSecret> {
    match env::var("JWT_SIGNING_SECRET") {
        Ok(value) => SigningSecret::from_base64(&value)
            .or_else(|_| SigningSecret::from_bytes(value.into_bytes()))
            .context("JWT_SIGNING_SECRET failed the minimum-strength check (needs >= 32 bytes)"),
        Err(_) if environment.is_prod() => {
            bail!("JWT_SIGNING_SECRET must be set in prod")
        }
        Err(_) => {
            tracing::warn!("JWT_SIGNING_SECRET not set; generating an ephemeral secret for this process only");
            Ok(SigningSecret::generate())
        }
    }
}

fn normalize_optional(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_origin_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `RATE_LIMIT_CLASSES` is a `;`-separated list of `name:capacity:refill_per_sec`
/// triples, e.g. `auth:5:0.1;api:100:10;websocket_upgrade:10:1`.
fn parse_rate_limit_classes(value: &str) -> Result<HashMap<String, RateLimitClass>> {
    let mut classes = HashMap::new();
    for entry in value.split(';') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let mut parts = entry.split(':');
        let name = parts
            .next()
            .ok_or_else(|| anyhow!("malformed rate limit class entry '{entry}'"))?;
        let capacity: u32 = parts
            .next()
            .ok_or_else(|| anyhow!("rate limit class '{name}' is missing a capacity"))?
            .parse()
            .with_context(|| format!("rate limit class '{name}' has a non-numeric capacity"))?;
        let refill_per_sec: f64 = parts
            .next()
            .ok_or_else(|| anyhow!("rate limit class '{name}' is missing a refill rate"))?
            .parse()
            .with_context(|| format!("rate limit class '{name}' has a non-numeric refill rate"))?;
        classes.insert(
            name.to_string(),
            RateLimitClass { capacity, refill_per_sec },
        );
    }
    if classes.is_empty() {
        bail!("no rate limit classes configured");
    }
    Ok(classes)
}

fn default_rate_limit_classes_spec() -> String {
    "auth:5:0.1;api:100:10;websocket_upgrade:10:1".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "APP_ENV", "BIND_ADDR", "JWT_SIGNING_SECRET", "JWT_ALGORITHM", "JWT_AUDIENCE",
            "JWKS_URL", "DATABASE_URL", "CORS_ALLOWED_ORIGINS", "RATE_LIMIT_CLASSES",
            "RATE_LIMIT_IDLE_THRESHOLD_SECONDS", "POLICY_STORE_URL", "CACHE_URL",
            "OBJECT_STORAGE_ENDPOINT", "OBJECT_STORAGE_ACCESS_KEY", "OBJECT_STORAGE_SECRET_KEY",
            "OUTBOUND_GATEWAY_URL", "OUTBOUND_GATEWAY_API_KEY", "AUDIT_RETENTION_DAYS",
        ] {
            env::remove_var(key);
        }
    }

    fn set_minimum_required() {
        env::set_var("JWT_AUDIENCE", "eduhub");
        env::set_var("DATABASE_URL", "postgres://localhost/eduhub");
        env::set_var("POLICY_STORE_URL", "http://localhost:9001");
        env::set_var("CACHE_URL", "redis://localhost:6379");
    }

    #[test]
    #[serial]
    fn prod_rejects_wildcard_cors() {
        clear_env();
        set_minimum_required();
        env::set_var("APP_ENV", "prod");
        env::set_var("JWT_SIGNING_SECRET", "a-very-long-random-signing-secret-value-ok");
        env::set_var("DATABASE_URL", "postgres://localhost/eduhub?sslmode=require");
        env::set_var("CORS_ALLOWED_ORIGINS", "*");
        let err = CoreConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("CORS_ALLOWED_ORIGINS"));
    }

    #[test]
    #[serial]
    fn prod_requires_sslmode_require() {
        clear_env();
        set_minimum_required();
        env::set_var("APP_ENV", "prod");
        env::set_var("JWT_SIGNING_SECRET", "a-very-long-random-signing-secret-value-ok");
        let err = CoreConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("sslmode=require"));
    }

    #[test]
    #[serial]
    fn dev_generates_ephemeral_secret_when_unset() {
        clear_env();
        set_minimum_required();
        let config = CoreConfig::from_env().unwrap();
        assert_eq!(config.jwt_signing_secret.as_bytes().len(), 32);
    }

    #[test]
    #[serial]
    fn outbound_gateway_url_without_key_is_fatal() {
        clear_env();
        set_minimum_required();
        env::set_var("OUTBOUND_GATEWAY_URL", "https://sso.example.edu");
        let err = CoreConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("OUTBOUND_GATEWAY_API_KEY"));
    }

    #[test]
    fn parse_rate_limit_classes_parses_multiple_entries() {
        let classes = parse_rate_limit_classes("auth:5:0.1;api:100:10").unwrap();
        assert_eq!(classes["auth"].capacity, 5);
        assert_eq!(classes["api"].refill_per_sec, 10.0);
    }
}
