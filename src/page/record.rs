//! Discovered-page records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::Fingerprint;
use crate::rules::FeatureType;

use super::PageSignature;

/// One discovered page, owned by the run that discovered it.
///
/// Created when a navigation yields a new fingerprint; immutable once
/// validated. The captured HTML is kept for selector resolution during test
/// generation but is not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    /// Fingerprint of the normalized URL.
    pub fingerprint: Fingerprint,
    /// URL as reached (post-redirect, pre-normalization).
    pub raw_url: String,
    /// Normalized URL.
    pub normalized_url: String,
    /// Navigation depth from the landing page.
    pub depth: usize,
    /// Structural signature.
    pub signature: PageSignature,
    /// Feature types detected on this page.
    pub features: Vec<FeatureType>,
    /// When the page was discovered.
    pub discovered_at: DateTime<Utc>,
    /// Captured DOM at discovery time; not persisted.
    #[serde(skip, default)]
    pub html: String,
}

impl PageRecord {
    /// Builds a record for a freshly analyzed page.
    pub fn new(
        fingerprint: Fingerprint,
        raw_url: impl Into<String>,
        normalized_url: impl Into<String>,
        depth: usize,
        signature: PageSignature,
        features: Vec<FeatureType>,
        html: impl Into<String>,
    ) -> Self {
        PageRecord {
            fingerprint,
            raw_url: raw_url.into(),
            normalized_url: normalized_url.into(),
            depth,
            signature,
            features,
            discovered_at: Utc::now(),
            html: html.into(),
        }
    }

    /// Whether the given feature was detected on this page.
    pub fn has_feature(&self, feature: &FeatureType) -> bool {
        self.features.contains(feature)
    }
}
