//! Configuration for EcoTrack
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::path::PathBuf;

use footprint_engine::FactorTable;

use crate::cli::Command;

/// EcoTrack - personal carbon footprint tracker
#[derive(Parser, Debug, Clone)]
#[command(name = "ecotrack")]
#[command(about = "Log activities and read carbon footprint dashboards")]
pub struct Args {
    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "ecotrack")]
    pub mongodb_db: String,

    /// Wrap entry inserts and stats updates in a transaction (needs a replica set)
    #[arg(long, env = "MONGODB_TRANSACTIONS", default_value = "true")]
    pub mongodb_transactions: bool,

    /// Emission factor table (.yaml, .yml or .json); built-in factors when unset
    #[arg(long, env = "FACTORS_PATH")]
    pub factors_path: Option<PathBuf>,

    /// Skip the database and keep entries in memory for this run
    #[arg(long, env = "OFFLINE", default_value = "false")]
    pub offline: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    /// Factor table from `factors_path`, or the built-in defaults
    pub fn factor_table(&self) -> footprint_engine::Result<FactorTable> {
        match &self.factors_path {
            Some(path) => FactorTable::from_file(path),
            None => Ok(FactorTable::default()),
        }
    }

    /// Whether the command needs storage at all
    pub fn needs_store(&self) -> bool {
        !self.offline && self.command.uses_store()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(format!("LOG_LEVEL must be one of {}", LEVELS.join(", ")));
        }

        if self.mongodb_db.trim().is_empty() {
            return Err("MONGODB_DB must not be empty".to_string());
        }

        Ok(())
    }
}
