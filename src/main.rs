//! Main application entry point (CLI binary).
//!
//! A thin wrapper around the `surface_scout` library: parses arguments,
//! initializes the logger, runs one discovery run, and prints a summary.
//! Core functionality lives in the library crate.

use anyhow::{Context, Result};
use clap::Parser;
use std::process;

use surface_scout::app::{init_logger_with, run};
use surface_scout::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    let log_level = config.log_level.clone();
    let log_format = config.log_format.clone();
    init_logger_with(log_level.into(), log_format).context("Failed to initialize logger")?;

    match run(config).await {
        Ok(true) => Ok(()),
        Ok(false) => {
            // The run itself failed; details are in the summary and artifacts.
            process::exit(1);
        }
        Err(e) => {
            eprintln!("surface_scout error: {e:#}");
            process::exit(1);
        }
    }
}
