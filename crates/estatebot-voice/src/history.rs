//! Conversation history store used by the response orchestrator.
//!
//! The store is the one resource shared by concurrent sessions. Every call
//! is scoped to a single `(user_id, session_id)` partition, so no locking
//! beyond the database's own is needed.

use crate::error::VoiceError;
use async_trait::async_trait;
use estatebot_db::{append_turn, list_recent_turns, list_session_turns, DbPool, HistoryError};
use estatebot_types::{ConversationTurn, Role};
use rusqlite::Connection;

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Appends one turn and returns it as stored.
    async fn append(
        &self,
        user_id: &str,
        session_id: &str,
        role: Role,
        text: &str,
    ) -> Result<ConversationTurn, VoiceError>;

    /// Up to `limit` turns of the partition, most recent first.
    async fn list_recent(
        &self,
        user_id: &str,
        session_id: &str,
        limit: u32,
    ) -> Result<Vec<ConversationTurn>, VoiceError>;

    /// The whole partition, oldest first.
    async fn list_all(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Vec<ConversationTurn>, VoiceError>;
}

/// SQLite-backed store. Each query runs on the blocking pool so a slow
/// write never stalls the runtime threads driving audio.
#[derive(Debug, Clone)]
pub struct SqliteHistoryStore {
    pool: DbPool,
}

impl SqliteHistoryStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, VoiceError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, HistoryError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(HistoryError::from)?;
            f(&*conn)
        })
        .await
        .map_err(|e| VoiceError::History(format!("history task failed: {e}")))?
        .map_err(VoiceError::from)
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn append(
        &self,
        user_id: &str,
        session_id: &str,
        role: Role,
        text: &str,
    ) -> Result<ConversationTurn, VoiceError> {
        let (user_id, session_id, text) =
            (user_id.to_string(), session_id.to_string(), text.to_string());
        self.with_conn(move |conn| append_turn(conn, &user_id, &session_id, role, &text))
            .await
    }

    async fn list_recent(
        &self,
        user_id: &str,
        session_id: &str,
        limit: u32,
    ) -> Result<Vec<ConversationTurn>, VoiceError> {
        let (user_id, session_id) = (user_id.to_string(), session_id.to_string());
        self.with_conn(move |conn| list_recent_turns(conn, &user_id, &session_id, limit))
            .await
    }

    async fn list_all(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Vec<ConversationTurn>, VoiceError> {
        let (user_id, session_id) = (user_id.to_string(), session_id.to_string());
        self.with_conn(move |conn| list_session_turns(conn, &user_id, &session_id))
            .await
    }
}
