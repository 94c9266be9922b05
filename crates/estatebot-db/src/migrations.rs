//! Embedded SQL migration runner.
//!
//! Migrations are SQL files embedded at compile time and applied in order on
//! startup. Applied names are tracked in `_estatebot_migrations`; a migration
//! never runs twice.

use rusqlite::Connection;
use std::collections::HashSet;
use thiserror::Error;

struct Migration {
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. New migrations are appended here.
const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "000_conversation_turns",
        sql: include_str!("migrations/000_conversation_turns.sql"),
    },
];

/// Errors that can occur during migration execution.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A SQL statement within a migration failed.
    #[error("migration '{name}' failed: {source}")]
    ExecutionFailed {
        /// The name of the migration that failed.
        name: String,
        /// The underlying SQLite error.
        source: rusqlite::Error,
    },

    /// Failed to query migration state.
    #[error("failed to check migration state: {0}")]
    StateQuery(rusqlite::Error),
}

/// Runs all pending migrations and returns how many were applied.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    run_migrations_from_list(conn, MIGRATIONS)
}

fn run_migrations_from_list(
    conn: &Connection,
    migrations: &[Migration],
) -> Result<usize, MigrationError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _estatebot_migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(MigrationError::StateQuery)?;

    let done: HashSet<String> = conn
        .prepare("SELECT name FROM _estatebot_migrations")
        .and_then(|mut stmt| {
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<HashSet<String>, _>>();
            names
        })
        .map_err(MigrationError::StateQuery)?;

    let pending: Vec<&Migration> = migrations
        .iter()
        .filter(|m| !done.contains(m.name))
        .collect();

    for migration in &pending {
        tracing::info!(migration = migration.name, "applying migration");
        apply(conn, migration).map_err(|source| MigrationError::ExecutionFailed {
            name: migration.name.to_string(),
            source,
        })?;
    }

    Ok(pending.len())
}

/// Applies one migration and records it, atomically.
fn apply(conn: &Connection, migration: &Migration) -> rusqlite::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(migration.sql)?;
    tx.execute(
        "INSERT INTO _estatebot_migrations (name) VALUES (?1)",
        [migration.name],
    )?;
    tx.commit()
}
