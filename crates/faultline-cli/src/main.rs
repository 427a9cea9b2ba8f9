mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use faultline_core::ServiceConfig;

use crate::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ServiceConfig::from_env();
    init_tracing(&config.log_level);
    commands::run(cli, config)
}

/// `RUST_LOG` wins; otherwise the configured level applies to every target.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
