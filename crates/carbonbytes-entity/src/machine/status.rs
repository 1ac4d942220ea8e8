//! Machine status enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stored status of a machine, derived from whether it has a holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineStatus {
    /// Nobody holds the machine.
    #[default]
    Idle,
    /// A user holds the machine.
    Active,
}

impl MachineStatus {
    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Active => "active",
        }
    }
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MachineStatus {
    type Err = carbonbytes_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(Self::Idle),
            "active" => Ok(Self::Active),
            _ => Err(carbonbytes_core::AppError::validation(format!(
                "Invalid machine status: '{s}'. Expected one of: idle, active"
            ))),
        }
    }
}
