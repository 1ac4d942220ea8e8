//! CLI command definitions and dispatch.

pub mod config;
pub mod leaderboard;
pub mod machine;
pub mod stats;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use carbonbytes_core::config::AppConfig;
use carbonbytes_core::error::AppError;
use carbonbytes_core::traits::DocumentStore;
use carbonbytes_core::types::UserId;
use carbonbytes_store::StoreManager;

/// Carbon Bytes: recycling machines and points
#[derive(Debug, Parser)]
#[command(name = "carbonbytes-cli", version, about, long_about = None)]
pub struct Cli {
    /// Directory holding `default.toml` and environment overlays
    #[arg(short, long, default_value = "config")]
    pub config: String,

    /// Environment overlay to merge over the defaults
    #[arg(short, long, default_value = "development")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Machine management
    Machine(machine::MachineArgs),
    /// Show the points leaderboard
    Leaderboard(leaderboard::LeaderboardArgs),
    /// Show a user's dashboard
    Dashboard(stats::UserArg),
    /// Show a user's all-time statistics
    Profile(stats::UserArg),
    /// Configuration management
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        let config = AppConfig::load(&self.config, &self.env)?;
        match &self.command {
            Commands::Machine(args) => machine::execute(args, &config, self.format).await,
            Commands::Leaderboard(args) => leaderboard::execute(args, &config, self.format).await,
            Commands::Dashboard(args) => stats::dashboard(args, &config, self.format).await,
            Commands::Profile(args) => stats::profile(args, &config, self.format).await,
            Commands::Config(args) => config::execute(args, &config, self.format),
        }
    }
}

/// Helper: open the configured document store
pub fn open_store(config: &AppConfig) -> Result<Arc<dyn DocumentStore>, AppError> {
    Ok(StoreManager::new(&config.store)?.store())
}

/// Helper: parse a user id argument
pub fn parse_user(raw: &str) -> Result<UserId, AppError> {
    UserId::parse(raw).map_err(|e| AppError::validation(format!("Invalid user id '{raw}': {e}")))
}
