//! Page identity: URL normalization and fingerprints.
//!
//! A fingerprint identifies a logical page independently of how it was
//! reached. It is derived from the normalized URL only; the navigation path
//! is deliberately excluded so the same page reached via two different click
//! paths dedupes to one entry.

mod visited;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use visited::{VisitMarker, VisitedSet};

/// Stable identifier for a logical page.
///
/// Hex-encoded prefix of the SHA-256 digest of the normalized URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Computes the fingerprint of an already-normalized URL.
    pub fn of_normalized(normalized: &str) -> Self {
        let digest = Sha256::digest(normalized.as_bytes());
        let hex: String = digest.iter().take(8).map(|b| format!("{b:02x}")).collect();
        Fingerprint(hex)
    }

    /// The hex form of the fingerprint.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalizes a URL for identity comparison.
///
/// Normalization steps, in order:
/// 1. strip the fragment;
/// 2. lexicographically sort query parameters;
/// 3. collapse a single trailing slash (the root path keeps its slash);
/// 4. lowercase the result.
///
/// Returns `None` for strings that do not parse as absolute http/https URLs.
pub fn normalize_url(raw: &str) -> Option<String> {
    let mut parsed = url::Url::parse(raw.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }

    parsed.set_fragment(None);

    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.is_empty() {
        parsed.set_query(None);
    } else {
        pairs.sort();
        // Re-encode through the serializer: a decoded value may itself
        // contain `&` or `=`, which must not re-read as structure.
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in &pairs {
            if v.is_empty() {
                serializer.append_key_only(k);
            } else {
                serializer.append_pair(k, v);
            }
        }
        let query = serializer.finish();
        parsed.set_query(Some(&query));
    }

    let path = parsed.path().to_string();
    if path.len() > 1 {
        if let Some(stripped) = path.strip_suffix('/') {
            parsed.set_path(stripped);
        }
    }

    Some(parsed.to_string().to_lowercase())
}

/// Normalizes a URL and computes its fingerprint in one step.
pub fn page_identity(raw: &str) -> Option<(String, Fingerprint)> {
    let normalized = normalize_url(raw)?;
    let fingerprint = Fingerprint::of_normalized(&normalized);
    Some((normalized, fingerprint))
}
