//! Dashboard and profile statistics.

pub mod dashboard;
pub mod waste;

pub use dashboard::{DashboardService, DashboardSummary, ProfileStats};
pub use waste::WasteBreakdown;
