//! Configuration types and CLI options.
//!
//! [`Config`] doubles as the clap argument struct for the binary and the
//! programmatic configuration for the library; `Default` gives a usable
//! baseline for embedding.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use super::constants::{
    DEFAULT_CHECK_TIMEOUT_SECS, DEFAULT_MAX_DEPTH, DEFAULT_SETTLE_MS, DEFAULT_TIME_BUDGET_SECS,
    DEFAULT_USER_AGENT, DEFAULT_VALIDATION_CONCURRENCY,
};

/// Logging level for the application.
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Engine configuration.
///
/// Credentials may come from flags or from the `SURFACE_SCOUT_USERNAME` /
/// `SURFACE_SCOUT_PASSWORD` environment variables.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "surface_scout",
    about = "Crawl a web application's UI surface and generate coverage-scored test cases"
)]
pub struct Config {
    /// Base URL of the target application
    #[arg(long)]
    pub base_url: String,

    /// Login username
    #[arg(long, env = "SURFACE_SCOUT_USERNAME", default_value = "")]
    pub username: String,

    /// Login password
    #[arg(long, env = "SURFACE_SCOUT_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,

    /// Environment tag recorded with the run (e.g. staging, qa)
    #[arg(long, default_value = "default")]
    pub environment: String,

    /// Directory where per-run artifacts are persisted
    #[arg(long, default_value = "./surface_scout_runs")]
    pub data_dir: PathBuf,

    /// Directory of plugin rule catalogs (JSON files), scanned at startup
    #[arg(long)]
    pub plugin_dir: Option<PathBuf>,

    /// Maximum concurrent validation browser sessions
    #[arg(long, default_value_t = DEFAULT_VALIDATION_CONCURRENCY)]
    pub validation_concurrency: usize,

    /// Maximum navigation depth from the post-login landing page
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    pub max_depth: usize,

    /// Wall-clock budget for the discovery crawl, in seconds
    #[arg(long, default_value_t = DEFAULT_TIME_BUDGET_SECS)]
    pub time_budget_seconds: u64,

    /// Settle interval after each interaction, in milliseconds
    #[arg(long, default_value_t = DEFAULT_SETTLE_MS)]
    pub settle_ms: u64,

    /// Per-validation-check timeout in seconds
    #[arg(long, default_value_t = DEFAULT_CHECK_TIMEOUT_SECS)]
    pub check_timeout_seconds: u64,

    /// HTTP User-Agent header value
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Append engine events to this JSONL file
    #[arg(long)]
    pub event_log: Option<PathBuf>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Log format
    #[arg(long, value_enum, default_value = "plain")]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: String::new(),
            password: String::new(),
            environment: "default".to_string(),
            data_dir: PathBuf::from("./surface_scout_runs"),
            plugin_dir: None,
            validation_concurrency: DEFAULT_VALIDATION_CONCURRENCY,
            max_depth: DEFAULT_MAX_DEPTH,
            time_budget_seconds: DEFAULT_TIME_BUDGET_SECS,
            settle_ms: DEFAULT_SETTLE_MS,
            check_timeout_seconds: DEFAULT_CHECK_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            event_log: None,
            log_level: LogLevel::Info,
            log_format: LogFormat::Plain,
        }
    }
}
