//! Database connection management.
//!
//! Owns a bounded pool of SQLite connections. Every operation runs inside a
//! scoped interaction: the pooled handle is checked out, the closure runs on
//! the blocking pool, and the handle goes back to the pool when it is dropped,
//! whichever way the interaction ends.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use deadpool_sqlite::{Config, Pool, PoolConfig, PoolError, Runtime};
use rusqlite::{Connection, InterruptHandle};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use mentor_core::config::DatabaseConfig;
use mentor_core::error::MentorError;

use crate::migrations;

/// Pool sizing and timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Connections opened and verified when the pool is created.
    pub min_connections: usize,
    /// Ceiling on concurrently checked-out connections.
    pub max_connections: usize,
    /// How long a caller may queue for a connection.
    pub acquire_timeout: Duration,
    /// How long a single interaction may run.
    pub command_timeout: Duration,
}

impl PoolSettings {
    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self {
            min_connections: config.min_connections,
            max_connections: config.max_connections,
            acquire_timeout: Duration::from_secs(config.acquire_timeout_secs),
            command_timeout: Duration::from_secs(config.command_timeout_secs),
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self::from_config(&DatabaseConfig::default())
    }
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub max_size: usize,
    pub size: usize,
    pub available: usize,
    pub waiting: usize,
}

/// Pooled SQLite database.
///
/// Cheap to clone; clones share the same pool.
#[derive(Clone)]
pub struct Database {
    pool: Pool,
    path: PathBuf,
    command_timeout: Duration,
}

impl Database {
    /// Open the database named by the configured connection string.
    ///
    /// Fails with `Config` when the url is unset and with `Connectivity` when
    /// the store cannot be opened. Runs migrations before returning.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, MentorError> {
        let path = parse_database_url(&config.url)?;
        Self::open(&path, PoolSettings::from_config(config)).await
    }

    /// Open (or create) a database file at the given path.
    pub async fn open(path: &Path, settings: PoolSettings) -> Result<Self, MentorError> {
        if settings.min_connections == 0 || settings.min_connections > settings.max_connections
        {
            return Err(MentorError::Config(format!(
                "invalid pool bounds: min {} max {}",
                settings.min_connections, settings.max_connections
            )));
        }

        // Ensure parent directory exists.
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    MentorError::Connectivity(format!(
                        "cannot create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let mut pool_config = PoolConfig::new(settings.max_connections);
        pool_config.timeouts.wait = Some(settings.acquire_timeout);
        pool_config.timeouts.create = Some(settings.acquire_timeout);
        pool_config.timeouts.recycle = Some(settings.acquire_timeout);

        let mut cfg = Config::new(path);
        cfg.pool = Some(pool_config);
        let pool = cfg
            .create_pool(Runtime::Tokio1)
            .map_err(|e| MentorError::Config(format!("Failed to create pool: {}", e)))?;

        let db = Self {
            pool,
            path: path.to_path_buf(),
            command_timeout: settings.command_timeout,
        };

        db.warm_up(settings.min_connections).await?;
        db.with_conn(|conn| {
            conn.execute_batch("PRAGMA journal_mode = WAL;")
                .map_err(|e| MentorError::Storage(format!("Failed to set pragmas: {}", e)))?;
            migrations::run_migrations(conn)
        })
        .await?;

        info!(
            path = %path.display(),
            min = settings.min_connections,
            max = settings.max_connections,
            "Database pool ready"
        );
        Ok(db)
    }

    /// Check out `count` distinct connections at once and verify each one.
    async fn warm_up(&self, count: usize) -> Result<(), MentorError> {
        let mut held = Vec::with_capacity(count);
        for _ in 0..count {
            let conn = self.pool.get().await.map_err(map_pool_error)?;
            conn.interact(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))
                .await
                .map_err(|e| MentorError::Connectivity(format!("warm-up failed: {}", e)))?
                .map_err(|e| MentorError::Connectivity(format!("warm-up query failed: {}", e)))?;
            held.push(conn);
        }
        debug!(count = held.len(), "Pool warmed up");
        Ok(())
    }

    /// Execute a closure with exclusive use of one pooled connection.
    ///
    /// This is the primary way to interact with the database. Callers queue
    /// while the pool is saturated; waits longer than the acquire timeout, and
    /// interactions longer than the command timeout, become `Timeout` errors.
    ///
    /// On a command timeout the running statement is interrupted and an
    /// interaction that has not started yet is skipped, so the work rolls
    /// back. A statement that commits before the interrupt lands stays
    /// committed even though the caller sees `Timeout`.
    pub async fn with_conn<F, T>(&self, f: F) -> Result<T, MentorError>
    where
        F: FnOnce(&mut Connection) -> Result<T, MentorError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.pool.get().await.map_err(map_pool_error)?;
        let busy = self.command_timeout;
        let cancelled = Arc::new(AtomicBool::new(false));
        let (handle_tx, mut handle_rx) = oneshot::channel::<InterruptHandle>();

        let skip = cancelled.clone();
        let work = conn.interact(move |conn| {
            let _ = handle_tx.send(conn.get_interrupt_handle());
            if skip.load(Ordering::SeqCst) {
                return Err(MentorError::Timeout(
                    "database command cancelled before it started".to_string(),
                ));
            }
            conn.execute_batch("PRAGMA foreign_keys = ON;")
                .map_err(|e| MentorError::Storage(format!("Failed to set pragmas: {}", e)))?;
            conn.busy_timeout(busy)
                .map_err(|e| MentorError::Storage(format!("Failed to set busy timeout: {}", e)))?;
            f(conn)
        });

        match tokio::time::timeout(self.command_timeout, work).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(MentorError::Storage(format!(
                "Database interaction aborted: {}",
                e
            ))),
            Err(_) => {
                cancelled.store(true, Ordering::SeqCst);
                if let Ok(handle) = handle_rx.try_recv() {
                    handle.interrupt();
                }
                warn!(timeout = ?self.command_timeout, "Database command timed out, interrupting");
                Err(MentorError::Timeout(format!(
                    "database command exceeded {:?}",
                    self.command_timeout
                )))
            }
        }
    }

    /// Round-trip a trivial query.
    pub async fn ping(&self) -> Result<(), MentorError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map_err(|e| MentorError::Connectivity(e.to_string()))?;
            Ok(())
        })
        .await
    }

    pub fn status(&self) -> PoolStatus {
        let status = self.pool.status();
        PoolStatus {
            max_size: status.max_size,
            size: status.size,
            available: status.available as usize,
            waiting: status.waiting,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the pool. Checked-out connections are dropped when returned.
    pub fn close(&self) {
        self.pool.close();
        info!(path = %self.path.display(), "Database pool closed");
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("status", &self.status())
            .finish()
    }
}

fn map_pool_error(err: PoolError) -> MentorError {
    match err {
        PoolError::Timeout(kind) => {
            MentorError::Timeout(format!("waiting for a database connection ({:?})", kind))
        }
        PoolError::Backend(e) => MentorError::Connectivity(format!("cannot open database: {}", e)),
        PoolError::Closed => MentorError::Connectivity("database pool is closed".to_string()),
        other => MentorError::Storage(other.to_string()),
    }
}

/// Resolve a connection string to a database file path.
///
/// Accepts `sqlite://<path>`, `sqlite:<path>` or a bare path.
pub fn parse_database_url(url: &str) -> Result<PathBuf, MentorError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(MentorError::Config("database url is not set".to_string()));
    }
    let path = trimmed
        .strip_prefix("sqlite://")
        .or_else(|| trimmed.strip_prefix("sqlite:"))
        .unwrap_or(trimmed);
    if path.is_empty() {
        return Err(MentorError::Config(format!(
            "database url has no path: {}",
            url
        )));
    }
    Ok(PathBuf::from(path))
}
