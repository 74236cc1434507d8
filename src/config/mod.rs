//! Configuration: CLI options, defaults, and tuning constants.

pub mod constants;
mod types;

pub use types::{Config, LogFormat, LogLevel};
