//! Rolling per-user conversation window.
//!
//! The working history is what gets sent to the model on every exchange. It
//! is capped at `2 * max_pairs` entries; older entries are dropped on save
//! and survive only in the audit log.

use std::sync::Arc;

use tracing::debug;

use crate::db::{ChatStore, StoreError};
use crate::llm::models::Turn;

pub const DEFAULT_MAX_PAIRS: usize = 10;

/// Keeps the most recent `2 * max_pairs` entries of `turns`.
pub fn truncate_history(turns: &[Turn], max_pairs: usize) -> &[Turn] {
    let max_entries = max_pairs.saturating_mul(2);
    let start = turns.len().saturating_sub(max_entries);
    &turns[start..]
}

#[derive(Clone)]
pub struct SessionHistoryManager {
    store: Arc<dyn ChatStore>,
    max_pairs: usize,
}

impl SessionHistoryManager {
    pub fn new(store: Arc<dyn ChatStore>, max_pairs: usize) -> Self {
        Self { store, max_pairs }
    }

    pub fn max_pairs(&self) -> usize {
        self.max_pairs
    }

    pub fn load(&self, user_id: i64) -> Result<Vec<Turn>, StoreError> {
        self.store.get_session_history(user_id)
    }

    pub fn save(&self, user_id: i64, turns: &[Turn]) -> Result<(), StoreError> {
        let kept = truncate_history(turns, self.max_pairs);
        if kept.len() < turns.len() {
            debug!(
                user_id,
                dropped = turns.len() - kept.len(),
                "Truncating working history"
            );
        }
        self.store.set_session_history(user_id, kept)
    }

    pub fn clear(&self, user_id: i64) -> Result<(), StoreError> {
        self.store.clear_session_history(user_id)
    }
}
