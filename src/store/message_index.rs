//! # Message Index
//!
//! Query layer over the record store for message history: cursor
//! pagination ordered by numeric timestamp, and the retention sweep.
//!
//! There is no timestamp-ordered index, so a page collects the whole
//! qualifying set for the conversation and sorts it afterwards. That is
//! an accepted O(conversation size) cost at chat scale, and it is what
//! makes the descending order a post-processing guarantee rather than a
//! property of scan order.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::store::{Message, Record, RecordStore};

/// Page size used when the caller does not supply a limit.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Cursor-paginated message queries and retention sweeping.
pub struct MessageIndex {
    store: Arc<RecordStore>,
}

impl MessageIndex {
    /// Create a message index over the given store.
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// Get one page of a conversation's history.
    ///
    /// Scans the by-conversation index, excludes records with numeric
    /// `timestamp >= before_timestamp` when supplied, and returns at most
    /// `limit` records sorted descending by numeric timestamp. Chaining
    /// `before_timestamp` from the last returned record's timestamp
    /// partitions the full history with no gaps and no duplicates.
    pub fn get_page(
        &self,
        conversation_id: &str,
        limit: Option<usize>,
        before_timestamp: Option<i64>,
    ) -> Result<Vec<Message>> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);

        let mut qualifying: Vec<Message> = self
            .store
            .get_by_index("idx_messages_conversation", conversation_id)?;

        if let Some(before) = before_timestamp {
            qualifying.retain(|m| m.numeric_timestamp() < before);
        }

        // Sort the entire qualifying set before truncating; taking the
        // first `limit` in scan order would hand back the oldest page.
        qualifying.sort_by(|a, b| b.numeric_timestamp().cmp(&a.numeric_timestamp()));
        qualifying.truncate(limit);

        Ok(qualifying)
    }

    /// Delete every message whose `delete_at` retention marker is due.
    ///
    /// Runs in one read-write transaction and returns the number of
    /// records removed. Records with no marker, or a marker in the
    /// future, are retained.
    pub fn sweep_expired(&self) -> Result<usize> {
        let now = crate::time::now_timestamp_millis();
        let conn = self.store.connection();
        let mut conn = conn.lock();

        let tx = conn
            .transaction()
            .map_err(|e| Error::StorageError(format!("Failed to begin sweep: {}", e)))?;

        let removed = tx
            .execute(
                &format!(
                    "DELETE FROM {} WHERE delete_at IS NOT NULL AND delete_at <= ?",
                    Message::TABLE
                ),
                [now],
            )
            .map_err(|e| Error::StorageError(format!("Retention sweep failed: {}", e)))?;

        tx.commit()
            .map_err(|e| Error::StorageError(format!("Failed to commit sweep: {}", e)))?;

        if removed > 0 {
            tracing::info!(removed, "Retention sweep removed expired messages");
        }

        Ok(removed)
    }
}

// ============================================================================
// TESTS
// ============================================================================
