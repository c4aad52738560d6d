//! Ring-buffer history over the layout

use crate::errors::{DirectoryError, DirectoryResult};
use crate::store::{HistoryEntry, Layout};
use crate::types::Key;

/// Stateless accessor; the buffers live in the layout.
pub struct HistoryLedger;

impl HistoryLedger {
    /// Record a committed change. Returns the storage slot written.
    ///
    /// Only called from a commit path, never exposed as a standalone mutation.
    pub(crate) fn append(layout: &mut Layout, key: Key, entry: HistoryEntry) -> usize {
        let capacity = layout.history_capacity;
        let cursor = layout.history_cursor.entry(key).or_insert(0);
        let buffer = layout.history.entry(key).or_default();

        let slot = if buffer.len() < capacity {
            buffer.push(entry);
            buffer.len() - 1
        } else {
            let slot = (*cursor % capacity as u64) as usize;
            buffer[slot] = entry;
            slot
        };

        *cursor += 1;
        slot
    }

    /// Number of stored entries, at most the capacity.
    pub fn count(layout: &Layout, key: &Key) -> usize {
        layout.history.get(key).map(Vec::len).unwrap_or(0)
    }

    /// Total number of commits ever recorded for `key`.
    pub fn cursor(layout: &Layout, key: &Key) -> u64 {
        layout.history_cursor.get(key).copied().unwrap_or(0)
    }

    /// Entry at storage slot `index`.
    pub fn at(layout: &Layout, key: &Key, index: usize) -> DirectoryResult<HistoryEntry> {
        let count = Self::count(layout, key);
        layout
            .history
            .get(key)
            .and_then(|entries| entries.get(index))
            .copied()
            .ok_or(DirectoryError::IndexOutOfBounds { index, count })
    }

    /// Entries in storage order.
    pub fn all(layout: &Layout, key: &Key) -> Vec<HistoryEntry> {
        layout.history.get(key).cloned().unwrap_or_default()
    }

    /// Entries oldest first.
    pub fn chronological(layout: &Layout, key: &Key) -> Vec<HistoryEntry> {
        let mut entries = Self::all(layout, key);
        let capacity = layout.history_capacity as u64;
        let cursor = Self::cursor(layout, key);
        if cursor > capacity {
            // oldest surviving entry sits at the next write slot
            entries.rotate_left((cursor % capacity) as usize);
        }
        entries
    }
}
