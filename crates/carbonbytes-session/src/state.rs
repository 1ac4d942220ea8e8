//! Client-side session state and its read-only projection.

use std::fmt;

use carbonbytes_core::error::{AppError, ErrorKind};
use carbonbytes_core::types::MachineId;
use carbonbytes_entity::machine::model::MachineRecord;
use carbonbytes_entity::machine::status::MachineStatus;

/// Why a scan or connect attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// The scanned machine has no record.
    NotFound,
    /// The machine is held by another user.
    InUse,
    /// The store refused to let the user read the machine.
    PermissionDenied,
    /// Network or store failure; retrying may work.
    Unavailable,
    /// The decoded text is not a usable machine id.
    InvalidCode,
    /// The camera could not be started.
    Scanner,
    /// Nobody is signed in.
    Unauthenticated,
    /// Anything else.
    Internal,
}

impl FailureReason {
    /// Classify an error from the connect path.
    pub fn from_kind(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NotFound => Self::NotFound,
            ErrorKind::Conflict => Self::InUse,
            ErrorKind::PermissionDenied => Self::PermissionDenied,
            ErrorKind::Transient => Self::Unavailable,
            ErrorKind::Validation => Self::InvalidCode,
            ErrorKind::Scanner => Self::Scanner,
            ErrorKind::Authentication => Self::Unauthenticated,
            _ => Self::Internal,
        }
    }

    /// Short label, e.g. for a status line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not found",
            Self::InUse => "in use",
            Self::PermissionDenied => "permission denied",
            Self::Unavailable => "unavailable",
            Self::InvalidCode => "invalid code",
            Self::Scanner => "camera unavailable",
            Self::Unauthenticated => "not signed in",
            Self::Internal => "internal error",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle phase of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    /// Nothing in progress.
    #[default]
    Idle,
    /// The code source is open.
    Scanning,
    /// A claim is in flight.
    Connecting,
    /// The machine is claimed (or held locally in degraded mode).
    Connected,
    /// The session is ending; a release may be in flight.
    Disconnecting,
    /// A scan or connect attempt failed. Always followed by `Idle`.
    Failed(FailureReason),
}

impl Phase {
    /// Short label.
    pub fn label(&self) -> String {
        match self {
            Self::Idle => "idle".into(),
            Self::Scanning => "scanning".into(),
            Self::Connecting => "connecting".into(),
            Self::Connected => "connected".into(),
            Self::Disconnecting => "disconnecting".into(),
            Self::Failed(reason) => format!("failed ({reason})"),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Display-relevant fields of the last machine read. Possibly stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineSnapshot {
    /// Machine id.
    pub id: MachineId,
    /// Display label.
    pub name: Option<String>,
    /// Stored status at the time of the read.
    pub status: MachineStatus,
}

impl MachineSnapshot {
    /// Label for display, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }
}

impl From<&MachineRecord> for MachineSnapshot {
    fn from(record: &MachineRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            status: record.status,
        }
    }
}

/// State owned exclusively by the controller task.
#[derive(Debug, Clone, Default)]
pub struct ClientSessionState {
    /// Current phase.
    pub phase: Phase,
    /// Machine being connected to or held.
    pub machine_id: Option<MachineId>,
    /// Last-read machine fields.
    pub machine: Option<MachineSnapshot>,
    /// Countdown; meaningful only while connected.
    pub seconds_remaining: u32,
    /// Connected without a confirmed claim write.
    pub degraded: bool,
    /// Most recent failure, cleared by every successful transition.
    pub last_error: Option<AppError>,
}

impl ClientSessionState {
    /// Return to `Idle`, dropping everything tied to the previous machine.
    /// `last_error` is left for the caller to decide.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.machine_id = None;
        self.machine = None;
        self.seconds_remaining = 0;
        self.degraded = false;
    }

    /// Read-only projection for the presentation layer.
    pub fn view(&self) -> SessionView {
        SessionView {
            phase: self.phase,
            machine_id: self.machine_id.clone(),
            machine: self.machine.clone(),
            seconds_remaining: self.seconds_remaining,
            degraded: self.degraded,
            last_error: self.last_error.clone(),
        }
    }
}

/// What the presentation layer sees.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionView {
    /// Current phase.
    pub phase: Phase,
    /// Targeted or held machine.
    pub machine_id: Option<MachineId>,
    /// Last-read machine fields.
    pub machine: Option<MachineSnapshot>,
    /// Countdown seconds.
    pub seconds_remaining: u32,
    /// Whether the session is local-only.
    pub degraded: bool,
    /// Error to show to the user.
    pub last_error: Option<AppError>,
}

impl SessionView {
    /// Whether a machine session is active.
    pub fn is_connected(&self) -> bool {
        self.phase == Phase::Connected
    }

    /// Countdown formatted as `m:ss`.
    pub fn countdown(&self) -> String {
        format_countdown(self.seconds_remaining)
    }

    /// One-line summary for terminals and logs.
    pub fn status_line(&self) -> String {
        let mut line = match (&self.phase, &self.machine) {
            (Phase::Connected, Some(machine)) => format!(
                "Connected to {} ({} left)",
                machine.display_name(),
                self.countdown()
            ),
            (Phase::Connecting, _) => match &self.machine_id {
                Some(id) => format!("Connecting to {id}..."),
                None => "Connecting...".to_string(),
            },
            (Phase::Scanning, _) => "Scanning for a machine code...".to_string(),
            (phase, _) => {
                let label = phase.label();
                let mut chars = label.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => label,
                }
            }
        };
        if self.degraded {
            line.push_str(" [local only]");
        }
        if let Some(err) = &self.last_error {
            line.push_str(&format!(" - {}", err.message));
        }
        line
    }
}

/// Format seconds as `m:ss`.
pub fn format_countdown(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
