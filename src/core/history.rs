//! Conversion history
//!
//! Bounded, most-recent-first list of committed conversions. The ledger is a
//! plain owned value: whoever drives the conversions (a session, a test)
//! constructs it and passes it where it is needed. Nothing is persisted.

use std::collections::VecDeque;
use tracing::debug;

use crate::shared::types::ConversionRecord;

/// Maximum number of conversions kept
pub const HISTORY_CAPACITY: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct HistoryLedger {
    entries: VecDeque<ConversionRecord>,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    /// Add an entry at the head.
    ///
    /// An entry repeating the current head (same from value, from unit and to
    /// unit) is dropped. Only the head is compared; older matches do not count.
    /// Returns whether the entry was inserted.
    pub fn record(&mut self, entry: ConversionRecord) -> bool {
        if let Some(head) = self.entries.front() {
            if head.is_repeat_of(&entry) {
                debug!(
                    "[HistoryLedger] Skipping repeat of head: {} {} -> {}",
                    entry.from_value, entry.from_unit, entry.to_unit
                );
                return false;
            }
        }

        self.entries.push_front(entry);
        if self.entries.len() > HISTORY_CAPACITY {
            self.entries.truncate(HISTORY_CAPACITY);
        }
        true
    }

    /// Most recent first
    pub fn list(&self) -> impl Iterator<Item = &ConversionRecord> + '_ {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<ConversionRecord> {
        self.entries.iter().cloned().collect()
    }

    pub fn head(&self) -> Option<&ConversionRecord> {
        self.entries.front()
    }

    /// Get a specific entry by index (0 = most recent)
    pub fn get(&self, index: usize) -> Option<&ConversionRecord> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        debug!("[HistoryLedger] Cleared all entries");
    }
}
