//! Tuning constants and heuristic keyword catalogs.

use std::time::Duration;

/// Default cap on simultaneous validation browser sessions.
///
/// Keeps the number of concurrent contexts against the target application
/// low enough not to overwhelm it.
pub const DEFAULT_VALIDATION_CONCURRENCY: usize = 3;

/// Default maximum navigation depth from the post-login landing page.
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Default wall-clock budget for the discovery crawl, in seconds.
pub const DEFAULT_TIME_BUDGET_SECS: u64 = 600;

/// Default settle interval after each interaction, in milliseconds.
pub const DEFAULT_SETTLE_MS: u64 = 500;

/// Default per-check timeout, in seconds. A check exceeding it is marked
/// failed; the run continues.
pub const DEFAULT_CHECK_TIMEOUT_SECS: u64 = 30;

/// Per-navigation timeout for the HTTP-backed driver.
pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(15);

/// Number of login attempts before the run is declared failed. The second
/// attempt only covers transient navigation errors, never rejected
/// credentials.
pub const LOGIN_ATTEMPTS: usize = 2;

/// Maximum option labels extracted per context-switcher candidate. Longer
/// lists are truncated and a warning logged with the true total.
pub const MAX_CONTEXT_OPTIONS: usize = 25;

/// Accepted length range for a context option label.
pub const CONTEXT_LABEL_MIN_LEN: usize = 2;
/// Upper bound of the accepted context label length range.
pub const CONTEXT_LABEL_MAX_LEN: usize = 60;

/// Keywords that mark an element as a likely tenant/workspace switcher when
/// found in its `name`, `id`, or `class` attributes.
pub const CONTEXT_KEYWORDS: &[&str] = &[
    "tenant",
    "project",
    "cell",
    "workspace",
    "org",
    "organization",
    "environment",
    "region",
    "namespace",
    "account",
    "team",
];

/// Option labels treated as placeholders and dropped during extraction.
pub const PLACEHOLDER_LABELS: &[&str] = &[
    "select",
    "choose",
    "all",
    "none",
    "please select",
    "select one",
    "choose one",
    "-",
    "--",
];

/// Link labels that are never followed during discovery. Logging out or
/// deleting data mid-crawl would invalidate the session.
pub const UNSAFE_LINK_KEYWORDS: &[&str] =
    &["logout", "log out", "sign out", "signout", "delete", "remove"];

/// User-Agent sent by the HTTP-backed driver.
pub const DEFAULT_USER_AGENT: &str = concat!("surface_scout/", env!("CARGO_PKG_VERSION"));
