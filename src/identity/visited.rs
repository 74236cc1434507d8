//! The visited-set: claim/confirm/release markers per fingerprint.
//!
//! A fingerprint is claimed atomically *before* the navigation that would
//! reach it is attempted, then either promoted to confirmed (navigation
//! succeeded) or rolled back to released (navigation failed). A released
//! fingerprint can be re-claimed via a different path, so one failed attempt
//! never permanently blacklists a reachable page.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::Fingerprint;

/// Visit state of a fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisitMarker {
    /// Claimed by a crawl path; navigation in flight.
    Claimed,
    /// Navigation succeeded; the page is permanently visited.
    Confirmed,
    /// A claim was rolled back after a failed navigation.
    Released,
}

/// Mapping from fingerprint to visit marker.
///
/// The only shared-mutable state in the engine. The claim operation is
/// atomic: of any number of concurrent claim attempts on one fingerprint,
/// exactly one succeeds.
#[derive(Debug, Default)]
pub struct VisitedSet {
    inner: Mutex<HashMap<Fingerprint, VisitMarker>>,
}

impl VisitedSet {
    /// Creates an empty visited-set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to claim a fingerprint.
    ///
    /// Succeeds when the fingerprint is unknown or currently released.
    /// Returns `false` when another path already holds a claim or has
    /// confirmed the page.
    pub fn claim(&self, fingerprint: &Fingerprint) -> bool {
        let mut inner = self.inner.lock().expect("visited-set lock poisoned");
        match inner.get(fingerprint) {
            None | Some(VisitMarker::Released) => {
                inner.insert(fingerprint.clone(), VisitMarker::Claimed);
                true
            }
            Some(VisitMarker::Claimed) | Some(VisitMarker::Confirmed) => false,
        }
    }

    /// Promotes a fingerprint to confirmed.
    ///
    /// Used both for claimed fingerprints after a successful navigation and
    /// for redirect aliases that were never separately claimed, so an entire
    /// redirect chain collapses to confirmed entries.
    pub fn confirm(&self, fingerprint: &Fingerprint) {
        let mut inner = self.inner.lock().expect("visited-set lock poisoned");
        inner.insert(fingerprint.clone(), VisitMarker::Confirmed);
    }

    /// Rolls a claimed fingerprint back to released.
    ///
    /// Confirmed fingerprints stay confirmed; releasing an unknown
    /// fingerprint is a no-op.
    pub fn release(&self, fingerprint: &Fingerprint) {
        let mut inner = self.inner.lock().expect("visited-set lock poisoned");
        if let Some(marker) = inner.get_mut(fingerprint) {
            if *marker == VisitMarker::Claimed {
                *marker = VisitMarker::Released;
            }
        }
    }

    /// Current marker for a fingerprint, if any.
    pub fn marker(&self, fingerprint: &Fingerprint) -> Option<VisitMarker> {
        let inner = self.inner.lock().expect("visited-set lock poisoned");
        inner.get(fingerprint).copied()
    }

    /// Whether the fingerprint has been confirmed.
    pub fn is_confirmed(&self, fingerprint: &Fingerprint) -> bool {
        self.marker(fingerprint) == Some(VisitMarker::Confirmed)
    }

    /// Number of confirmed pages.
    pub fn confirmed_count(&self) -> usize {
        let inner = self.inner.lock().expect("visited-set lock poisoned");
        inner
            .values()
            .filter(|m| **m == VisitMarker::Confirmed)
            .count()
    }

    /// Snapshot of every marker, for persistence and diagnostics.
    pub fn snapshot(&self) -> HashMap<Fingerprint, VisitMarker> {
        let inner = self.inner.lock().expect("visited-set lock poisoned");
        inner.clone()
    }
}
