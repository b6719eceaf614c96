//! Connection pool construction and shutdown for the request-servicing
//! core: one Postgres pool for tenant data and the audit store, one Redis
//! connection manager for the shared permission cache.

use std::time::Duration;

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Bundles the pools a request handler needs. Cheap to clone: `PgPool` and
/// `ConnectionManager` are themselves cheaply-cloneable handles over a
/// shared connection set.
#[derive(Clone)]
pub struct Pools {
    pub db: PgPool,
    pub cache: ConnectionManager,
}

impl Pools {
    pub async fn connect(database_url: &str, cache_url: &str) -> Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(20)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .context("failed to connect to the database")?;

        let cache_client = redis::Client::open(cache_url).context("invalid cache URL")?;
        let cache = ConnectionManager::new(cache_client)
            .await
            .context("failed to connect to the cache")?;

        Ok(Self { db, cache })
    }

    /// Build a pool without eagerly connecting, for tests that never touch
    /// the database but need something satisfying `PgPool`'s type.
    pub fn connect_lazy(database_url: &str) -> Result<PgPool> {
        PgPoolOptions::new()
            .max_connections(1)
            .connect_lazy(database_url)
            .context("failed to build a lazy pool")
    }

    /// Close the database pool, waiting for in-flight queries to finish.
    /// Called from the shutdown sequence after in-flight requests have
    /// drained.
    pub async fn close(&self) {
        if !self.db.is_closed() {
            self.db.close().await;
        }
    }

    /// Round-trip a `PING` against the cache, for readiness checks. A
    /// `ConnectionManager` reconnects on its own after a drop, so this never
    /// needs to rebuild the pool, only report whether it's currently reachable.
    pub async fn cache_ok(&self) -> bool {
        let mut conn = self.cache.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await.is_ok()
    }
}
