//! Configuration CLI commands.

use clap::{Args, Subcommand};

use crate::output::{self, OutputFormat};
use carbonbytes_core::config::AppConfig;
use carbonbytes_core::error::AppError;

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
}

/// Execute config commands
pub fn execute(args: &ConfigArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => match format {
            OutputFormat::Json => output::print_json(&redacted(config)),
            OutputFormat::Table => {
                let config = redacted(config);
                output::print_kv("Session length", &format!("{}s", config.session.session_length_seconds));
                output::print_kv("Refresh interval", &format!("{}s", config.session.refresh_interval_seconds));
                output::print_kv("Live updates", &config.session.live_updates.to_string());
                output::print_kv("Preferred camera", &format!("{:?}", config.scanner.preferred_camera));
                output::print_kv("Store provider", &config.store.provider);
                if config.store.provider == "firestore" {
                    output::print_kv("Firestore project", &config.store.firestore.project_id);
                    output::print_kv(
                        "Firestore API key",
                        config.store.firestore.api_key.as_deref().unwrap_or("-"),
                    );
                } else {
                    output::print_kv(
                        "Seed file",
                        config.store.memory.seed_file.as_deref().unwrap_or("-"),
                    );
                }
                output::print_kv("Leaderboard size", &config.dashboard.leaderboard_size.to_string());
                output::print_kv("Log level", &config.logging.level);
                output::print_kv("Log format", &config.logging.format);
            }
        },
    }
    Ok(())
}

/// Copy of the configuration with secrets masked for display
fn redacted(config: &AppConfig) -> AppConfig {
    let mut config = config.clone();
    if let Some(key) = config.store.firestore.api_key.as_mut() {
        *key = mask(key);
    }
    config
}

fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{visible}****")
}
