//! Error types and run-level error statistics.
//!
//! The error taxonomy distinguishes recoverable conditions (navigation
//! failures, failed validation checks, context-detection misses, malformed
//! plugins) from fatal ones (irrecoverable login, unreachable target).
//! Recoverable conditions are tallied in [`ErrorStats`] and never abort a run.

mod stats;
mod types;

pub use stats::ErrorStats;
pub use types::{BrowserError, EngineError, ErrorKind, StorageError};
