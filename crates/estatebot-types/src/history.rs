//! The bounded conversation window handed to the conversational engine.

use crate::{ConversationTurn, Role};
use serde::{Deserialize, Serialize};

/// Number of entries in a voice-session history window, including the
/// current utterance.
pub const DEFAULT_HISTORY_WINDOW: usize = 20;

/// One entry in the window, in the shape the engine consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

/// Chronologically ordered context for one engine call.
///
/// Holds at most `capacity` entries: the most recent `capacity - 1`
/// persisted turns followed by the current user utterance. The last entry is
/// always the current utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HistoryWindow {
    entries: Vec<HistoryEntry>,
}

impl HistoryWindow {
    /// Builds a window from prior turns ordered most-recent-first, as the
    /// store returns them. Extra turns beyond `capacity - 1` are dropped from
    /// the old end. A `capacity` of zero is treated as one.
    pub fn build(
        prior_most_recent_first: Vec<ConversationTurn>,
        current_utterance: &str,
        capacity: usize,
    ) -> Self {
        let keep = capacity.max(1) - 1;
        let mut entries: Vec<HistoryEntry> = prior_most_recent_first
            .into_iter()
            .take(keep)
            .map(|turn| HistoryEntry {
                role: turn.role,
                content: turn.text,
            })
            .collect();
        entries.reverse();
        entries.push(HistoryEntry {
            role: Role::User,
            content: current_utterance.to_string(),
        });
        Self { entries }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: a window contains at least the current utterance.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The utterance this window was built for.
    pub fn current(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }
}
