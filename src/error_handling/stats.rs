//! Per-run recoverable-error statistics.
//!
//! Thread-safe counters keyed by [`ErrorKind`], shared across the crawl
//! thread and the validator pool via `Arc`.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use strum::IntoEnumIterator;

use super::types::ErrorKind;

/// Thread-safe counters for recoverable error categories.
///
/// All categories are initialized to zero on creation so increments never
/// need to allocate. Counters use relaxed ordering; they are statistics,
/// not synchronization.
pub struct ErrorStats {
    counts: HashMap<ErrorKind, AtomicU64>,
}

impl ErrorStats {
    /// Creates a tracker with every category initialized to zero.
    pub fn new() -> Self {
        let mut counts = HashMap::new();
        for kind in ErrorKind::iter() {
            counts.insert(kind, AtomicU64::new(0));
        }
        ErrorStats { counts }
    }

    /// Increments the counter for the given category.
    pub fn increment(&self, kind: ErrorKind) {
        if let Some(counter) = self.counts.get(&kind) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!(
                "error counter for {kind:?} missing from stats map; \
                 this indicates a bug in ErrorStats initialization"
            );
        }
    }

    /// Current count for one category.
    pub fn count(&self, kind: ErrorKind) -> u64 {
        self.counts
            .get(&kind)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Snapshot of all counters keyed by their stable string name.
    ///
    /// Returned as a `BTreeMap` so serialized snapshots are deterministic.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        ErrorKind::iter()
            .map(|kind| (kind.as_str().to_string(), self.count(kind)))
            .collect()
    }

    /// Total recoverable errors across all categories.
    pub fn total(&self) -> u64 {
        ErrorKind::iter().map(|kind| self.count(kind)).sum()
    }
}

impl Default for ErrorStats {
    fn default() -> Self {
        Self::new()
    }
}
