//! Conversation-turn queries.
//!
//! The table is append-only. Ordering within a `(user_id, session_id)`
//! partition uses the autoincrement `id`, so two turns written within the
//! same second still come back in the order they were persisted.

use estatebot_types::{ConversationTurn, Role};
use rusqlite::{params, Connection, Row};
use thiserror::Error;

/// Errors that can occur while reading or writing turns.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

/// Appends a turn to the partition and returns the stored row.
pub fn append_turn(
    conn: &Connection,
    user_id: &str,
    session_id: &str,
    role: Role,
    text: &str,
) -> Result<ConversationTurn, HistoryError> {
    let turn = conn.query_row(
        "INSERT INTO conversation_turns (user_id, session_id, role, message)
         VALUES (?1, ?2, ?3, ?4)
         RETURNING id, user_id, session_id, role, message, created_at",
        params![user_id, session_id, role.as_str(), text],
        map_row_to_turn,
    )?;
    Ok(turn)
}

/// Returns up to `limit` turns of the partition, most recent first.
pub fn list_recent_turns(
    conn: &Connection,
    user_id: &str,
    session_id: &str,
    limit: u32,
) -> Result<Vec<ConversationTurn>, HistoryError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, session_id, role, message, created_at
         FROM conversation_turns
         WHERE user_id = ?1 AND session_id = ?2
         ORDER BY id DESC
         LIMIT ?3",
    )?;

    let rows = stmt.query_map(params![user_id, session_id, limit], map_row_to_turn)?;
    let mut turns = Vec::new();
    for row in rows {
        turns.push(row?);
    }
    Ok(turns)
}

/// Returns the whole partition, oldest first.
pub fn list_session_turns(
    conn: &Connection,
    user_id: &str,
    session_id: &str,
) -> Result<Vec<ConversationTurn>, HistoryError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, session_id, role, message, created_at
         FROM conversation_turns
         WHERE user_id = ?1 AND session_id = ?2
         ORDER BY id ASC",
    )?;

    let rows = stmt.query_map(params![user_id, session_id], map_row_to_turn)?;
    let mut turns = Vec::new();
    for row in rows {
        turns.push(row?);
    }
    Ok(turns)
}

fn map_row_to_turn(row: &Row) -> rusqlite::Result<ConversationTurn> {
    let role_str: String = row.get(3)?;
    let role: Role = role_str.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(ConversationTurn {
        id: row.get(0)?,
        user_id: row.get(1)?,
        session_id: row.get(2)?,
        role,
        text: row.get(4)?,
        created_at: row.get(5)?,
    })
}
