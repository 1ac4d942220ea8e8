//! Dashboard, profile and leaderboard sizing.

use serde::{Deserialize, Serialize};

/// Result sizes for the read-only dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Transactions shown on the dashboard.
    #[serde(default = "default_recent_transactions")]
    pub recent_transactions: usize,
    /// Transactions listed as recent activity on the profile.
    #[serde(default = "default_profile_recent")]
    pub profile_recent_activity: usize,
    /// Users shown on the leaderboard.
    #[serde(default = "default_leaderboard_size")]
    pub leaderboard_size: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            recent_transactions: default_recent_transactions(),
            profile_recent_activity: default_profile_recent(),
            leaderboard_size: default_leaderboard_size(),
        }
    }
}

fn default_recent_transactions() -> usize {
    10
}

fn default_profile_recent() -> usize {
    5
}

fn default_leaderboard_size() -> usize {
    50
}
