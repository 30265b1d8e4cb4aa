use std::time::{Duration, Instant};

use anyhow::Context;
use sqlx::{pool::PoolConnection, postgres::PgPoolOptions, PgConnection, PgPool, Postgres};
use tracing::{debug, warn};

use crate::config::DbConfig;

/// Connections held longer than this are reported when released.
const HOLD_WARN_AFTER: Duration = Duration::from_secs(5);

pub async fn connect(cfg: &DbConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .acquire_timeout(cfg.acquire_timeout())
        .idle_timeout(Some(cfg.idle_timeout()))
        .connect(&cfg.url)
        .await
        .context("connect to database")
}

/// Repository backed by PostgreSQL. Implements every repository trait.
#[derive(Clone)]
pub struct PgRepo {
    pool: PgPool,
}

impl PgRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Checks out a connection labelled with the operation it serves.
    pub async fn conn(&self, label: &'static str) -> anyhow::Result<TrackedConnection> {
        TrackedConnection::acquire(&self.pool, label).await
    }
}

/// A pooled connection that logs how long it was held and goes back to the
/// pool exactly once, on [`TrackedConnection::release`] or on drop.
pub struct TrackedConnection<C = PoolConnection<Postgres>> {
    conn: Option<C>,
    label: &'static str,
    acquired_at: Instant,
}

impl TrackedConnection {
    pub async fn acquire(pool: &PgPool, label: &'static str) -> anyhow::Result<Self> {
        let started = Instant::now();
        let conn = pool
            .acquire()
            .await
            .with_context(|| format!("acquire connection for {label}"))?;
        let wait_ms = started.elapsed().as_millis() as u64;
        debug!(query = label, wait_ms, "connection acquired");
        Ok(Self::hold(conn, label))
    }

    pub fn executor(&mut self) -> anyhow::Result<&mut PgConnection> {
        let conn = self.held_mut()?;
        Ok(&mut **conn)
    }
}

impl<C> TrackedConnection<C> {
    fn hold(conn: C, label: &'static str) -> Self {
        Self {
            conn: Some(conn),
            label,
            acquired_at: Instant::now(),
        }
    }

    fn held_mut(&mut self) -> anyhow::Result<&mut C> {
        match self.conn.as_mut() {
            Some(conn) => Ok(conn),
            None => anyhow::bail!("connection for {} already released", self.label),
        }
    }

    pub fn release(mut self) {
        self.finish();
    }

    /// Drops the held connection. Returns how long it was held, or `None`
    /// when it had already been given back.
    fn finish(&mut self) -> Option<Duration> {
        let conn = self.conn.take()?;
        let held = self.acquired_at.elapsed();
        let held_ms = held.as_millis() as u64;
        if held > HOLD_WARN_AFTER {
            warn!(query = self.label, held_ms, "connection held too long");
        } else {
            debug!(query = self.label, held_ms, "query finished");
        }
        drop(conn);
        Some(held)
    }
}

impl<C> Drop for TrackedConnection<C> {
    fn drop(&mut self) {
        self.finish();
    }
}
