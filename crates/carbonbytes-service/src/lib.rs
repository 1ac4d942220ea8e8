//! # carbonbytes-service
//!
//! Read-side services for the Carbon Bytes client: profile bootstrap at
//! sign-in, dashboard and profile statistics, and the points leaderboard.
//!
//! Services follow constructor injection; the document store is provided
//! at construction time as an `Arc<dyn DocumentStore>`.

pub mod leaderboard;
pub mod stats;
pub mod user;

pub use leaderboard::{LeaderboardEntry, LeaderboardService};
pub use stats::{DashboardService, DashboardSummary, ProfileStats, WasteBreakdown};
pub use user::UserService;
