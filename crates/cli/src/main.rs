use std::process::ExitCode;

use anyhow::{anyhow, Result};
use approvly_cli::Cli;
use approvly_core::config::AppConfig;
use clap::Parser;

/// Logs go to stderr; stdout carries one JSON result per command.
fn init_logging(config: &AppConfig) -> Result<()> {
    use approvly_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::WARN);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    match config.logging.format {
        Compact => builder.compact().try_init(),
        Pretty => builder.pretty().try_init(),
        Json => builder.json().try_init(),
    }
    .map_err(|error| anyhow!("failed to install log subscriber: {error}"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // A broken config is reported by the command itself.
    if let Ok(config) = AppConfig::load(cli.load_options()) {
        if let Err(error) = init_logging(&config) {
            eprintln!("{error}");
        }
    }

    approvly_cli::run(cli)
}
