//! Machine session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Machine session timing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Length of a session window in countdown ticks (seconds by default).
    #[serde(default = "default_session_length")]
    pub session_length_seconds: u32,
    /// Duration of one countdown tick in milliseconds.
    #[serde(default = "default_tick_millis")]
    pub countdown_tick_millis: u64,
    /// Activity refresher period in seconds.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_seconds: u64,
    /// Whether to subscribe to live updates of the claimed machine.
    #[serde(default = "default_true")]
    pub live_updates: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_length_seconds: default_session_length(),
            countdown_tick_millis: default_tick_millis(),
            refresh_interval_seconds: default_refresh_interval(),
            live_updates: default_true(),
        }
    }
}

impl SessionConfig {
    /// Countdown tick period.
    pub fn countdown_tick(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_millis)
    }

    /// Activity refresher period.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_seconds)
    }

    /// Reject settings that would make a session expire immediately or spin.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.session_length_seconds == 0 {
            return Err(AppError::configuration(
                "session.session_length_seconds must be greater than 0",
            ));
        }
        if self.countdown_tick_millis == 0 {
            return Err(AppError::configuration(
                "session.countdown_tick_millis must be greater than 0",
            ));
        }
        if self.refresh_interval_seconds == 0 {
            return Err(AppError::configuration(
                "session.refresh_interval_seconds must be greater than 0",
            ));
        }
        Ok(())
    }
}

fn default_session_length() -> u32 {
    120
}

fn default_tick_millis() -> u64 {
    1000
}

fn default_refresh_interval() -> u64 {
    10
}

fn default_true() -> bool {
    true
}
