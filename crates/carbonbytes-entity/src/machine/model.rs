//! Machine document model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use carbonbytes_core::error::AppError;
use carbonbytes_core::types::{Document, MachineId, Patch, UserId};

use super::fields;
use super::status::MachineStatus;

/// A machine document as read from the store.
///
/// The client never owns this record; it reads it, and writes claim,
/// heartbeat and release patches against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineRecord {
    /// Machine id (document key, printed as the QR payload).
    pub id: MachineId,
    /// Holder of the claim.
    #[serde(default)]
    pub current_session: Option<UserId>,
    /// Stored status.
    #[serde(default)]
    pub status: MachineStatus,
    /// Server time of the last claim or heartbeat.
    #[serde(default)]
    pub last_active: Option<DateTime<Utc>>,
    /// Display label.
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredMachine {
    #[serde(default)]
    current_session: Option<UserId>,
    #[serde(default)]
    status: Option<MachineStatus>,
    #[serde(default)]
    last_active: Option<DateTime<Utc>>,
    #[serde(default)]
    name: Option<String>,
}

/// How a machine relates to a given user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ownership {
    /// Nobody holds it.
    Unclaimed,
    /// The user holds it.
    Mine,
    /// A different user holds it.
    Other(UserId),
}

impl MachineRecord {
    /// Decode a machine from a `machines` document.
    ///
    /// A missing `status` is derived from `currentSession`.
    pub fn from_document(doc: &Document) -> Result<Self, AppError> {
        let id = MachineId::parse(&doc.id)?;
        let stored: StoredMachine = doc.decode()?;
        let status = stored.status.unwrap_or(if stored.current_session.is_some() {
            MachineStatus::Active
        } else {
            MachineStatus::Idle
        });
        Ok(Self {
            id,
            current_session: stored.current_session,
            status,
            last_active: stored.last_active,
            name: stored.name,
        })
    }

    /// Classify the current holder relative to `user`.
    pub fn ownership(&self, user: &UserId) -> Ownership {
        match &self.current_session {
            None => Ownership::Unclaimed,
            Some(holder) if holder == user => Ownership::Mine,
            Some(holder) => Ownership::Other(holder.clone()),
        }
    }

    /// Whether `user` holds the claim.
    pub fn is_held_by(&self, user: &UserId) -> bool {
        self.current_session.as_ref() == Some(user)
    }

    /// Label for display, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }

    /// Patch claiming the machine for `user`.
    pub fn claim_patch(user: &UserId) -> Patch {
        Patch::new()
            .set(fields::CURRENT_SESSION, user.as_str())
            .set(fields::STATUS, MachineStatus::Active.as_str())
            .server_timestamp(fields::LAST_ACTIVE)
    }

    /// Patch renewing the holder's activity timestamp.
    pub fn heartbeat_patch() -> Patch {
        Patch::new().server_timestamp(fields::LAST_ACTIVE)
    }

    /// Patch clearing the claim.
    pub fn release_patch() -> Patch {
        Patch::new()
            .set_null(fields::CURRENT_SESSION)
            .set(fields::STATUS, MachineStatus::Idle.as_str())
    }

    /// Patch for a freshly registered, idle machine.
    pub fn registration_patch(name: Option<&str>) -> Patch {
        let patch = Self::release_patch();
        match name {
            Some(name) => patch.set(fields::NAME, name),
            None => patch,
        }
    }
}
