//! Dashboard and profile statistics CLI commands.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use carbonbytes_core::config::AppConfig;
use carbonbytes_core::error::AppError;
use carbonbytes_entity::transaction::Transaction;
use carbonbytes_service::{DashboardService, WasteBreakdown};

/// Arguments naming a user
#[derive(Debug, Args)]
pub struct UserArg {
    /// User id
    #[arg(short, long)]
    pub user: String,
}

/// Transaction display row for table output
#[derive(Debug, Serialize, Tabled)]
struct TransactionRow {
    /// When
    time: String,
    /// Waste type
    waste: String,
    /// Points
    points: i64,
    /// Machine
    machine: String,
}

impl From<&Transaction> for TransactionRow {
    fn from(t: &Transaction) -> Self {
        Self {
            time: output::timestamp(t.timestamp),
            waste: t.waste_type.label().to_string(),
            points: t.points,
            machine: t
                .machine_id
                .as_ref()
                .map_or_else(|| "-".to_string(), ToString::to_string),
        }
    }
}

fn service(config: &AppConfig) -> Result<DashboardService, AppError> {
    Ok(DashboardService::new(
        super::open_store(config)?,
        config.dashboard.clone(),
    ))
}

/// Execute the dashboard command
pub async fn dashboard(args: &UserArg, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let user = super::parse_user(&args.user)?;
    let summary = service(config)?.summary(&user).await?;

    if format == OutputFormat::Json {
        output::print_json(&summary);
        return Ok(());
    }
    output::print_kv("User", summary.user_id.as_str());
    output::print_kv("Points", &summary.points.to_string());
    print_breakdown(&summary.waste);
    println!();
    let rows: Vec<TransactionRow> = summary.recent.iter().map(TransactionRow::from).collect();
    output::print_list(&rows, format);
    Ok(())
}

/// Execute the profile command
pub async fn profile(args: &UserArg, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let user = super::parse_user(&args.user)?;
    let stats = service(config)?.profile_stats(&user).await?;

    if format == OutputFormat::Json {
        output::print_json(&stats);
        return Ok(());
    }
    match &stats.profile {
        Some(profile) => {
            output::print_kv("Name", profile.display_name());
            output::print_kv("Email", profile.email.as_deref().unwrap_or("-"));
            output::print_kv("Balance", &profile.points.to_string());
            output::print_kv("Member since", &output::timestamp(profile.created_at));
        }
        None => output::print_warning(&format!("User '{user}' has no profile")),
    }
    output::print_kv("Items recycled", &stats.total_items.to_string());
    output::print_kv("Points earned", &stats.total_points.to_string());
    print_breakdown(&stats.waste);
    println!();
    let rows: Vec<TransactionRow> = stats.recent.iter().map(TransactionRow::from).collect();
    output::print_list(&rows, format);
    Ok(())
}

fn print_breakdown(waste: &WasteBreakdown) {
    for (kind, count) in waste.iter() {
        output::print_kv(kind.label(), &count.to_string());
    }
}
