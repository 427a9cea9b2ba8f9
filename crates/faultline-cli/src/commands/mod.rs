use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;

use faultline_core::models::{ErrorStats, IssuedApiKey, StoredError};
use faultline_core::stats::compute_stats;
use faultline_core::{FaultlineError, ServiceConfig, SqliteStateStore, TimeRange};

use crate::cli::{ApiKeyCommand, Cli, Commands};


pub(crate) fn run(cli: Cli, mut config: ServiceConfig) -> Result<()> {
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    tracing::debug!(db_path = %config.db_path.display(), "resolved state database");

    match cli.command {
        Commands::Serve(args) => {
            if let Some(host) = args.host {
                config.host = host;
            }
            if let Some(port) = args.port {
                config.port = port;
            }
            faultline_web::serve_web(&config)
        }
        Commands::Stats(args) => print_json(&stats(&config.db_path, &args.time_range)?),
        Commands::Show(args) => print_json(&show(&config.db_path, &args.error_id)?),
        Commands::ApiKey(args) => match args.command {
            ApiKeyCommand::Create {
                name,
                permissions,
                expires_in_days,
            } => print_json(&create_api_key(
                &config.db_path,
                &name,
                &permissions,
                expires_in_days,
            )?),
        },
    }
}

fn open_store(db_path: &Path) -> Result<SqliteStateStore> {
    SqliteStateStore::open(db_path)
        .with_context(|| format!("failed to open state database at {}", db_path.display()))
}

fn stats(db_path: &Path, time_range: &str) -> Result<ErrorStats> {
    let store = open_store(db_path)?;
    let stats = compute_stats(&store, TimeRange::parse(time_range), Utc::now())?;
    Ok(stats)
}

fn show(db_path: &Path, error_id: &str) -> Result<StoredError> {
    let store = open_store(db_path)?;
    let record = store
        .get_error_report(error_id)?
        .ok_or_else(|| FaultlineError::NotFound(format!("error report {error_id}")))?;
    Ok(record)
}

fn create_api_key(
    db_path: &Path,
    name: &str,
    permissions: &[String],
    expires_in_days: Option<u32>,
) -> Result<IssuedApiKey> {
    let store = open_store(db_path)?;
    let issued = store.create_api_key(name, permissions, expires_in_days, Utc::now())?;
    Ok(issued)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
