use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use eduhub_audit::{PgAuditSink, RetentionWorker};
use eduhub_auth::{JwtConfig, JwtVerifier, PgSessionStore, SessionConfig};
use eduhub_config::CoreConfig;
use eduhub_core::router;
use eduhub_core::state::AppState;
use eduhub_observability::{init_tracing, CoreMetrics};
use eduhub_pool::Pools;
use eduhub_ratelimit::{RateLimiter, Sweeper};
use eduhub_security::PermissionChecker;
use eduhub_wshub::{Hub, HubConfig};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CoreConfig::from_env().context("failed to load configuration")?;
    init_tracing(config.environment.is_prod());

    info!(bind_addr = %config.bind_addr, "starting eduhub-core");

    let pools = Pools::connect(&config.database_url, &config.cache_url)
        .await
        .context("failed to connect to dependencies")?;

    // Migrations are append-only and versioned; `sqlx::migrate!` refuses to
    // run (and so we refuse to start) if the database has already had a
    // migration applied that this binary's `migrations/` directory doesn't
    // know about, rather than silently serving traffic against a schema it
    // doesn't understand.
    sqlx::migrate!("./migrations")
        .run(&pools.db)
        .await
        .context("failed to apply database migrations")?;

    let metrics = CoreMetrics::new();

    let jwt_algorithm = parse_jwt_algorithm(&config.jwt_algorithm)?;
    let jwt_config = JwtConfig::new("eduhub", config.jwt_audience.clone(), jwt_algorithm);
    let mut jwt_builder = JwtVerifier::builder(jwt_config);
    if let Some(jwks_url) = &config.jwks_url {
        jwt_builder = jwt_builder.with_jwks_url(jwks_url.clone());
    } else {
        jwt_builder = jwt_builder
            .with_hmac_secret("default", config.jwt_signing_secret.as_bytes());
    }
    let jwt_verifier = Arc::new(
        jwt_builder
            .build()
            .await
            .context("failed to initialize the JWT verifier")?,
    );

    let sessions = PgSessionStore::new(pools.db.clone(), SessionConfig::default());

    let fail_open_actions = std::collections::HashSet::new();
    let permissions = Arc::new(PermissionChecker::new(
        config.policy_store_url.clone(),
        Duration::from_secs(60),
        fail_open_actions,
        metrics.clone(),
    ));

    let rate_limit_classes = config
        .rate_limit_classes
        .iter()
        .map(|(name, class)| {
            (
                name.clone(),
                eduhub_ratelimit::RateLimitClass {
                    capacity: class.capacity,
                    refill_per_sec: class.refill_per_sec,
                },
            )
        })
        .collect();
    let rate_limiter = Arc::new(RateLimiter::new(rate_limit_classes, metrics.clone()));

    let audit_sink: Arc<dyn eduhub_audit::AuditSink> = Arc::new(PgAuditSink::new(pools.db.clone()));

    let ws_hub = Arc::new(Hub::new(HubConfig::default(), metrics.clone()));

    let shutdown = CancellationToken::new();

    let sweeper = Sweeper::new(rate_limiter.clone(), Duration::from_secs(30), config.rate_limit_idle_threshold);
    tokio::spawn(sweeper.run(shutdown.clone()));

    let retention = RetentionWorker::new(pools.db.clone(), config.audit_retention_days, metrics.clone());
    tokio::spawn(retention.run(shutdown.clone()));

    let state = AppState {
        pools: pools.clone(),
        jwt_verifier,
        sessions,
        jwt_signing_secret: config.jwt_signing_secret.clone(),
        permissions,
        rate_limiter,
        audit_sink,
        ws_hub,
        metrics,
        cors_allowed_origins: Arc::new(config.cors_allowed_origins.clone()),
    };

    let app = router::build(state);

    let addr: SocketAddr = config.bind_addr.parse().context("invalid BIND_ADDR")?;
    let listener = TcpListener::bind(addr).await.context("failed to bind listen address")?;
    info!(%addr, "listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(wait_for_shutdown_signal(shutdown.clone()))
        .await
        .context("server error")?;

    shutdown.cancel();
    pools.close().await;

    Ok(())
}

fn parse_jwt_algorithm(raw: &str) -> anyhow::Result<jsonwebtoken::Algorithm> {
    use jsonwebtoken::Algorithm;
    match raw.trim().to_ascii_uppercase().as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        "RS256" => Ok(Algorithm::RS256),
        "RS384" => Ok(Algorithm::RS384),
        "RS512" => Ok(Algorithm::RS512),
        "ES256" => Ok(Algorithm::ES256),
        "ES384" => Ok(Algorithm::ES384),
        other => anyhow::bail!("unsupported JWT_ALGORITHM '{other}'"),
    }
}

async fn wait_for_shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, draining in-flight requests");
    shutdown.cancel();
}
