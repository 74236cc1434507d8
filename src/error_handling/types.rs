//! Error type definitions.
//!
//! This module defines the typed error domains used throughout the engine:
//! browser/navigation failures, persistent-store failures, and run-fatal
//! engine errors.

use std::time::Duration;

use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Errors surfaced by a browser driver while interacting with the target
/// application.
///
/// These are *navigation errors* in the taxonomy: the crawl recovers from
/// them locally (by releasing the deduplication claim) and a validation
/// check that hits one is marked failed rather than aborting the page.
#[derive(Error, Debug)]
pub enum BrowserError {
    /// Navigation did not settle within the allowed time.
    #[error("navigation timed out after {0:?}")]
    NavTimeout(Duration),

    /// No element in the live DOM matched the given selector.
    #[error("element not found: {0}")]
    ElementNotFound(String),

    /// A `<select>` or menu did not contain the requested option.
    #[error("option not found: {0}")]
    OptionNotFound(String),

    /// The element matched but cannot be acted on (e.g. a script-driven
    /// widget the driver cannot execute).
    #[error("element not actionable: {0}")]
    NotActionable(String),

    /// Transport-level navigation failure (connection refused, DNS, 5xx).
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// An invalid CSS selector was supplied.
    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    /// The session has no current page yet.
    #[error("session has no current page")]
    NoCurrentPage,
}

/// Errors from the per-run persistent store.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Filesystem-level failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted artifact could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The requested run has no artifacts on disk.
    #[error("no persisted run with id {0}")]
    RunNotFound(String),
}

/// Fatal or caller-facing engine errors.
///
/// Anything that transitions a run to `FAILED`, plus lifecycle-API misuse
/// (unknown run id, answering a run that is not suspended).
#[derive(Error, Debug)]
pub enum EngineError {
    /// Login could not be completed (bad credentials or an unrecognized
    /// landing state).
    #[error("login failed: {0}")]
    LoginFailed(String),

    /// The target base URL could not be reached at all.
    #[error("target unreachable: {0}")]
    TargetUnreachable(String),

    /// No run with the given id is known to this engine.
    #[error("no run with id {0}")]
    RunNotFound(String),

    /// `answer` was called on a run that is not suspended at
    /// `WAIT_CONTEXT_INPUT`.
    #[error("run {0} is not awaiting context input")]
    NotAwaitingInput(String),

    /// `answer` carried a question id that does not match the pending one.
    #[error("unknown question id: {0}")]
    UnknownQuestion(String),

    /// The answered selection is not one of the offered options.
    #[error("invalid context selection: {0}")]
    InvalidSelection(String),

    /// The run was cancelled via the lifecycle API.
    #[error("run cancelled")]
    Cancelled,

    /// Persistent-store failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Browser failure at a point the machine cannot recover from.
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),
}

/// Recoverable error categories tallied per run.
///
/// One variant per class of the error-handling taxonomy. Fatal errors are
/// not counted here; they are recorded as the run's failure reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum ErrorKind {
    /// Element not found, timeout, or unexpected redirect during the crawl.
    Navigation,
    /// A validation check failed its assertion or threw during interaction.
    ValidationCheck,
    /// Context detection hit an internal error and defaulted to "no context".
    ContextDetection,
    /// A plugin catalog file was malformed and skipped.
    PluginLoad,
}

impl ErrorKind {
    /// Stable snake_case key used in snapshots and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Navigation => "navigation",
            ErrorKind::ValidationCheck => "validation_check",
            ErrorKind::ContextDetection => "context_detection",
            ErrorKind::PluginLoad => "plugin_load",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
