//! CLI argument handling beyond the basics: enum-valued flags, paths, and
//! the mapping from parsed configuration to engine settings.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use surface_scout::{Config, EngineSettings, LogFormat, LogLevel};

#[test]
fn minimal_invocation_uses_defaults() {
    let config = Config::try_parse_from(["surface_scout", "--base-url", "https://app.example.com"])
        .expect("minimal args should parse");

    assert_eq!(config.base_url, "https://app.example.com");
    assert_eq!(config.environment, "default");
    assert_eq!(config.data_dir, PathBuf::from("./surface_scout_runs"));
    assert!(config.plugin_dir.is_none());
    assert!(config.event_log.is_none());
    assert!(matches!(config.log_level, LogLevel::Info));
    assert!(matches!(config.log_format, LogFormat::Plain));
}

#[test]
fn path_flags_parse_into_pathbufs() {
    let config = Config::try_parse_from([
        "surface_scout",
        "--base-url",
        "https://app.example.com",
        "--data-dir",
        "/var/lib/scout",
        "--plugin-dir",
        "./plugins",
        "--event-log",
        "./events.jsonl",
    ])
    .expect("path args should parse");

    assert_eq!(config.data_dir, PathBuf::from("/var/lib/scout"));
    assert_eq!(config.plugin_dir, Some(PathBuf::from("./plugins")));
    assert_eq!(config.event_log, Some(PathBuf::from("./events.jsonl")));
}

#[test]
fn log_flags_accept_known_variants_only() {
    let config = Config::try_parse_from([
        "surface_scout",
        "--base-url",
        "https://app.example.com",
        "--log-level",
        "debug",
        "--log-format",
        "json",
    ])
    .expect("enum args should parse");
    assert!(matches!(config.log_level, LogLevel::Debug));
    assert!(matches!(config.log_format, LogFormat::Json));

    let result = Config::try_parse_from([
        "surface_scout",
        "--base-url",
        "https://app.example.com",
        "--log-level",
        "verbose",
    ]);
    assert!(result.is_err());
}

#[test]
fn non_numeric_tuning_values_are_rejected() {
    let result = Config::try_parse_from([
        "surface_scout",
        "--base-url",
        "https://app.example.com",
        "--max-depth",
        "deep",
    ]);
    assert!(result.is_err());

    let result = Config::try_parse_from([
        "surface_scout",
        "--base-url",
        "https://app.example.com",
        "--time-budget-seconds",
        "-5",
    ]);
    assert!(result.is_err());
}

#[test]
fn engine_settings_follow_parsed_config() {
    let config = Config::try_parse_from([
        "surface_scout",
        "--base-url",
        "https://app.example.com",
        "--validation-concurrency",
        "8",
        "--max-depth",
        "3",
        "--time-budget-seconds",
        "120",
        "--settle-ms",
        "250",
        "--check-timeout-seconds",
        "15",
    ])
    .expect("tuning args should parse");

    let settings = EngineSettings::from(&config);
    assert_eq!(settings.validation_concurrency, 8);
    assert_eq!(settings.max_depth, 3);
    assert_eq!(settings.time_budget, Duration::from_secs(120));
    assert_eq!(settings.settle, Duration::from_millis(250));
    assert_eq!(settings.check_timeout, Duration::from_secs(15));
}
