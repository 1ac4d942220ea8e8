//! Leaderboard CLI command.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use carbonbytes_core::config::AppConfig;
use carbonbytes_core::error::AppError;
use carbonbytes_service::{LeaderboardEntry, LeaderboardService};

/// Arguments for the leaderboard command
#[derive(Debug, Args)]
pub struct LeaderboardArgs {
    /// Number of users to show (defaults to `dashboard.leaderboard_size`)
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// Leaderboard display row for table output
#[derive(Debug, Serialize, Tabled)]
struct LeaderboardRow {
    /// Rank
    rank: usize,
    /// Name
    name: String,
    /// Points
    points: i64,
    /// User ID
    user_id: String,
}

impl From<LeaderboardEntry> for LeaderboardRow {
    fn from(e: LeaderboardEntry) -> Self {
        Self {
            rank: e.rank,
            name: e.display_name,
            points: e.points,
            user_id: e.user_id.into_string(),
        }
    }
}

/// Execute the leaderboard command
pub async fn execute(
    args: &LeaderboardArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let store = super::open_store(config)?;
    let size = args.limit.unwrap_or(config.dashboard.leaderboard_size);
    let entries = LeaderboardService::new(store, size).top().await?;

    match format {
        OutputFormat::Json => output::print_json(&entries),
        OutputFormat::Table => {
            let rows: Vec<LeaderboardRow> = entries.into_iter().map(LeaderboardRow::from).collect();
            output::print_list(&rows, format);
        }
    }
    Ok(())
}
