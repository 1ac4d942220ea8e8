//! Machine management CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;
use uuid::Uuid;

use crate::output::{self, OutputFormat};
use carbonbytes_core::config::AppConfig;
use carbonbytes_core::error::AppError;
use carbonbytes_core::events::ReleaseStatus;
use carbonbytes_core::types::{MachineId, Query, WriteMode};
use carbonbytes_entity::machine::{self, MachineRecord};
use carbonbytes_session::ClaimProtocol;
use tracing::warn;

/// Arguments for machine commands
#[derive(Debug, Args)]
pub struct MachineArgs {
    /// Machine subcommand
    #[command(subcommand)]
    pub command: MachineCommand,
}

/// Machine subcommands
#[derive(Debug, Subcommand)]
pub enum MachineCommand {
    /// List all machines
    List {
        /// Only show machines someone holds
        #[arg(short, long)]
        active: bool,
    },
    /// Show one machine
    Show {
        /// Machine id (the QR payload)
        id: String,
    },
    /// Register a new idle machine
    Register {
        /// Machine id; a random one is generated if omitted
        #[arg(long)]
        id: Option<String>,
        /// Display label
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Clear a stuck claim
    Release {
        /// Machine id
        id: String,
    },
}

/// Machine display row for table output
#[derive(Debug, Serialize, Tabled)]
struct MachineRow {
    /// Machine ID
    id: String,
    /// Name
    name: String,
    /// Status
    status: String,
    /// Holder
    holder: String,
    /// Last active
    last_active: String,
}

impl From<&MachineRecord> for MachineRow {
    fn from(m: &MachineRecord) -> Self {
        Self {
            id: m.id.to_string(),
            name: m.name.clone().unwrap_or_default(),
            status: m.status.to_string(),
            holder: m
                .current_session
                .as_ref()
                .map_or_else(|| "-".to_string(), ToString::to_string),
            last_active: output::timestamp(m.last_active),
        }
    }
}

/// Execute machine commands
pub async fn execute(
    args: &MachineArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let store = super::open_store(config)?;

    match &args.command {
        MachineCommand::List { active } => {
            let docs = store.query(machine::COLLECTION, &Query::new()).await?;
            let rows: Vec<MachineRow> = docs
                .iter()
                .filter_map(|doc| match MachineRecord::from_document(doc) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!(machine_id = %doc.id, error = %e, "Skipping malformed machine");
                        None
                    }
                })
                .filter(|m| !active || m.current_session.is_some())
                .map(|m| MachineRow::from(&m))
                .collect();
            output::print_list(&rows, format);
        }
        MachineCommand::Show { id } => {
            let id = parse_machine(id)?;
            let record = ClaimProtocol::new(store)
                .read(&id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Machine '{id}' not found")))?;
            output::print_item(&record, format);
        }
        MachineCommand::Register { id, name } => {
            let id = match id {
                Some(raw) => parse_machine(raw)?,
                None => MachineId::parse(&Uuid::new_v4().simple().to_string())?,
            };
            if store.get(machine::COLLECTION, id.as_str()).await?.is_some() {
                return Err(AppError::conflict(format!("Machine '{id}' already exists")));
            }
            store
                .set(
                    machine::COLLECTION,
                    id.as_str(),
                    MachineRecord::registration_patch(name.as_deref()),
                    WriteMode::Replace,
                )
                .await?;
            output::print_success(&format!("Machine '{id}' registered"));
            if format == OutputFormat::Table {
                output::print_kv("QR payload", id.as_str());
            }
        }
        MachineCommand::Release { id } => {
            let id = parse_machine(id)?;
            let protocol = ClaimProtocol::new(store);
            let record = protocol
                .read(&id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Machine '{id}' not found")))?;
            let Some(holder) = record.current_session else {
                output::print_warning(&format!("Machine '{id}' is already idle"));
                return Ok(());
            };
            match protocol.release(&id, &holder).await {
                ReleaseStatus::Released => {
                    output::print_success(&format!("Released '{id}' from user '{holder}'"));
                }
                ReleaseStatus::Missing | ReleaseStatus::NotHeld | ReleaseStatus::Superseded => {
                    output::print_warning(&format!("Claim on '{id}' changed before release"));
                }
                ReleaseStatus::Failed { message } => {
                    return Err(AppError::transient(format!("Failed to release '{id}': {message}")));
                }
            }
        }
    }

    Ok(())
}

fn parse_machine(raw: &str) -> Result<MachineId, AppError> {
    MachineId::parse(raw).map_err(|e| AppError::validation(format!("Invalid machine id '{raw}': {e}")))
}
