//! History Ledger
//!
//! Bounded, newest-first record of recent crash points.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

/// Default number of entries kept.
pub const HISTORY_CAPACITY: usize = 15;

/// One finished round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Round identifier.
    pub id: u64,
    /// Where the round crashed.
    pub crash_point: f64,
    /// When the round was settled.
    pub recorded_at: DateTime<Utc>,
}

/// Fixed-capacity newest-first ledger.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryLedger {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl Default for HistoryLedger {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}

impl HistoryLedger {
    /// Create an empty ledger. Capacity is at least 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a crash point, evicting the oldest entry when full.
    pub fn record(&mut self, id: u64, crash_point: f64, recorded_at: DateTime<Utc>) {
        self.entries.push_front(HistoryEntry {
            id,
            crash_point,
            recorded_at,
        });
        self.entries.truncate(self.capacity);
    }

    /// Entries, newest first.
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Copy of the entries, newest first.
    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Most recent entry.
    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Is the ledger empty?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
