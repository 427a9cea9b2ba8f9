use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use faultline_core::time_range::DEFAULT_TIME_RANGE;


pub const DEFAULT_API_KEY_PERMISSION: &str = "read:error-stats";

#[derive(Debug, Parser)]
#[command(name = "faultline")]
#[command(about = "Error reporting and aggregation service", version)]
pub struct Cli {
    /// SQLite database file. Overrides FAULTLINE_DB_PATH.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP gateway.
    Serve(ServeArgs),
    /// Print statistics computed straight from storage.
    Stats(StatsArgs),
    /// Print one stored error report.
    Show(ShowArgs),
    /// Manage API keys for the statistics endpoint.
    ApiKey(ApiKeyArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    #[arg(long, default_value = DEFAULT_TIME_RANGE)]
    pub time_range: String,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    pub error_id: String,
}

#[derive(Debug, Args)]
pub struct ApiKeyArgs {
    #[command(subcommand)]
    pub command: ApiKeyCommand,
}

#[derive(Debug, Subcommand)]
pub enum ApiKeyCommand {
    /// Issue a key. The secret is printed once and never stored.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long = "permission", default_values_t = [DEFAULT_API_KEY_PERMISSION.to_string()])]
        permissions: Vec<String>,
        #[arg(long)]
        expires_in_days: Option<u32>,
    },
}
