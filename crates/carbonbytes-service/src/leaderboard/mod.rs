//! Points leaderboard.

pub mod service;

pub use service::{LeaderboardEntry, LeaderboardService, rank};
