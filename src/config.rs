//! Command-line and environment configuration.
//!
//! Every flag can also be set through an `NPLUSONE_*` environment variable;
//! an explicit flag wins over the environment.

use std::net::SocketAddr;

use clap::Parser;
use tracing::Level;

use crate::telemetry::LoggingConfig;

#[derive(Debug, Clone, Parser)]
#[command(name = "nplusone-batch", version, about = "Compare fetch strategies for authors and their books")]
pub struct Config {
    /// SQLite connection URL. In-memory databases use a single connection.
    #[arg(long, env = "NPLUSONE_DATABASE_URL", default_value = "sqlite::memory:")]
    pub database_url: String,

    /// Address the HTTP server listens on.
    #[arg(long, env = "NPLUSONE_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Number of authors to seed into an empty database.
    #[arg(long, env = "NPLUSONE_SEED_AUTHORS", default_value_t = 500)]
    pub seed_authors: u32,

    /// Collections loaded per query by the batch-size strategy.
    #[arg(long, env = "NPLUSONE_LAZY_BATCH_SIZE", default_value_t = 100, value_parser = parse_batch_size)]
    pub lazy_batch_size: usize,

    #[arg(long, env = "NPLUSONE_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,

    /// Emit logs as JSON instead of text.
    #[arg(long, env = "NPLUSONE_LOG_JSON")]
    pub log_json: bool,

    /// Level used when `RUST_LOG` is not set.
    #[arg(long, env = "NPLUSONE_LOG_LEVEL", default_value = "info")]
    pub log_level: Level,
}

impl Config {
    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            json_format: self.log_json,
            default_level: self.log_level,
        }
    }
}

fn parse_batch_size(value: &str) -> Result<usize, String> {
    let batch_size: usize = value
        .parse()
        .map_err(|error| format!("invalid batch size {value:?}: {error}"))?;
    if batch_size == 0 {
        return Err("batch size must be at least 1".to_string());
    }
    Ok(batch_size)
}
