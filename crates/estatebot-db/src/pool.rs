//! Connection pool creation and configuration.

use crate::migrations::{run_migrations, MigrationError};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;
use std::time::Duration;
use thiserror::Error;

/// Runtime tunables for SQLite connection behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// Busy timeout for SQLite connections, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled SQLite connections.
    pub pool_max_size: u32,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 4,
        }
    }
}

/// A type alias for the SQLite connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Errors that can occur when opening the database.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Failed to build the connection pool.
    #[error("failed to create database connection pool: {0}")]
    PoolInit(#[from] r2d2::Error),

    /// Schema migrations could not be applied.
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

/// Creates a new SQLite connection pool with WAL mode enabled.
///
/// `:memory:` gives every pooled connection its own private database, so
/// tests that share state across connections should use a temp file or a
/// pool of size one.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;

    let busy_timeout = Duration::from_millis(settings.busy_timeout_ms);
    let manager = SqliteConnectionManager::file(db_path)
        .with_flags(flags)
        .with_init(move |conn| {
            let journal_mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            // In-memory databases stay in "memory" mode.
            if !journal_mode.eq_ignore_ascii_case("wal") && journal_mode != "memory" {
                return Err(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                    Some(format!("could not enable WAL, journal_mode is {journal_mode}")),
                ));
            }
            conn.busy_timeout(busy_timeout)
        });

    let pool = Pool::builder()
        .max_size(settings.pool_max_size)
        .build(manager)?;

    Ok(pool)
}

/// Creates the pool and brings the schema up to date.
pub fn open_database(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    let pool = create_pool(db_path, settings)?;
    let conn = pool.get()?;
    let applied = run_migrations(&conn)?;
    if applied > 0 {
        tracing::info!(count = applied, path = db_path, "applied database migrations");
    }
    drop(conn);
    Ok(pool)
}
