//! Machine session events published to the presentation layer.

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::types::id::{MachineId, UserId};

/// Why a connected session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DisconnectReason {
    /// The user asked to disconnect.
    UserRequested,
    /// The countdown reached zero.
    Expired,
    /// A read showed another holder (or none) on the machine.
    OwnershipLost {
        /// The holder observed by the read.
        holder: Option<UserId>,
    },
    /// A read showed the machine record no longer exists.
    MachineDeleted,
    /// The controller was torn down.
    Unmounted,
}

/// Result of a release attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReleaseStatus {
    /// The claim was cleared.
    Released,
    /// Someone else (or nobody) held the machine; nothing written.
    NotHeld,
    /// The machine record no longer exists.
    Missing,
    /// A later attempt of the same client claimed the machine; nothing written.
    Superseded,
    /// The release read or write failed.
    Failed {
        /// What went wrong.
        message: String,
    },
}

/// Events emitted by the session controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    /// The code source was opened.
    ScanStarted,
    /// Scanning was cancelled by the user.
    ScanCancelled,
    /// A connect attempt (or the scan leading to it) failed.
    ConnectFailed {
        /// Targeted machine, when a code had been decoded.
        machine_id: Option<MachineId>,
        /// Failure category.
        kind: ErrorKind,
        /// Human-readable message.
        message: String,
    },
    /// A session started.
    Connected {
        /// The claimed machine.
        machine_id: MachineId,
        /// The claiming user.
        user_id: UserId,
        /// The claim write was denied; the session is local-only.
        degraded: bool,
        /// The machine was already held by this user.
        reclaimed: bool,
    },
    /// A heartbeat write succeeded and the countdown was reset.
    Refreshed {
        /// The machine.
        machine_id: MachineId,
    },
    /// A heartbeat failed without proving loss of ownership.
    RefreshFailed {
        /// The machine.
        machine_id: MachineId,
        /// Failure category.
        kind: ErrorKind,
        /// Human-readable message.
        message: String,
    },
    /// A session ended.
    Disconnected {
        /// The machine.
        machine_id: MachineId,
        /// Why.
        reason: DisconnectReason,
    },
    /// A background release finished.
    Released {
        /// The machine.
        machine_id: MachineId,
        /// Outcome.
        outcome: ReleaseStatus,
    },
}

impl SessionEvent {
    /// Machine the event is about, if any.
    pub fn machine_id(&self) -> Option<&MachineId> {
        match self {
            Self::ScanStarted | Self::ScanCancelled => None,
            Self::ConnectFailed { machine_id, .. } => machine_id.as_ref(),
            Self::Connected { machine_id, .. }
            | Self::Refreshed { machine_id }
            | Self::RefreshFailed { machine_id, .. }
            | Self::Disconnected { machine_id, .. }
            | Self::Released { machine_id, .. } => Some(machine_id),
        }
    }
}
