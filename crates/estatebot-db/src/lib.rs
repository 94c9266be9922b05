//! Persistence layer for estatebot conversations.
//!
//! Provides the SQLite connection pool (via `r2d2`), embedded migrations and
//! the conversation-turn queries behind the history store. Turns are an
//! append-only log partitioned by `(user_id, session_id)`; readers always see
//! them in insertion order.
//!
//! All functions here are synchronous and take a borrowed `Connection`.
//! Async callers are expected to hop onto a blocking thread first.

mod history;
mod migrations;
mod pool;

pub use history::{append_turn, list_recent_turns, list_session_turns, HistoryError};
pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, open_database, DbPool, DbRuntimeSettings, PoolError};
