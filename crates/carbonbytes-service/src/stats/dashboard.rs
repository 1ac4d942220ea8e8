//! Dashboard and profile statistics over a user's transactions.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use carbonbytes_core::config::dashboard::DashboardConfig;
use carbonbytes_core::result::AppResult;
use carbonbytes_core::traits::DocumentStore;
use carbonbytes_core::types::{Direction, Document, Query, UserId};
use carbonbytes_entity::transaction::{self, Transaction};
use carbonbytes_entity::user::{self, UserProfile};

use super::waste::WasteBreakdown;

/// What the dashboard shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    /// The user.
    pub user_id: UserId,
    /// Current balance (0 without a profile).
    pub points: i64,
    /// Most recent transactions, newest first.
    pub recent: Vec<Transaction>,
    /// Categories of the recent transactions.
    pub waste: WasteBreakdown,
}

/// What the profile page shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileStats {
    /// Stored profile, if any.
    pub profile: Option<UserProfile>,
    /// Items deposited over all time.
    pub total_items: u32,
    /// Points earned over all time.
    pub total_points: i64,
    /// Categories over all time.
    pub waste: WasteBreakdown,
    /// Most recent transactions, newest first.
    pub recent: Vec<Transaction>,
}

/// Read-only statistics for the dashboard and profile views.
#[derive(Debug, Clone)]
pub struct DashboardService {
    store: Arc<dyn DocumentStore>,
    config: DashboardConfig,
}

impl DashboardService {
    /// Creates a new dashboard service.
    pub fn new(store: Arc<dyn DocumentStore>, config: DashboardConfig) -> Self {
        Self { store, config }
    }

    /// Balance plus the most recent transactions and their categories.
    pub async fn summary(&self, user_id: &UserId) -> AppResult<DashboardSummary> {
        let profile = self.profile(user_id).await?;
        let recent = self
            .transactions(user_id, Some(self.config.recent_transactions))
            .await?;
        Ok(DashboardSummary {
            user_id: user_id.clone(),
            points: profile.map_or(0, |p| p.points),
            waste: WasteBreakdown::from_transactions(&recent),
            recent,
        })
    }

    /// All-time totals plus a short recent-activity list.
    pub async fn profile_stats(&self, user_id: &UserId) -> AppResult<ProfileStats> {
        let profile = self.profile(user_id).await?;
        let all = self.transactions(user_id, None).await?;
        Ok(ProfileStats {
            profile,
            total_items: u32::try_from(all.len()).unwrap_or(u32::MAX),
            total_points: all.iter().map(|t| t.points).sum(),
            waste: WasteBreakdown::from_transactions(&all),
            recent: all
                .into_iter()
                .take(self.config.profile_recent_activity)
                .collect(),
        })
    }

    async fn profile(&self, user_id: &UserId) -> AppResult<Option<UserProfile>> {
        self.store
            .get(user::COLLECTION, user_id.as_str())
            .await?
            .as_ref()
            .map(UserProfile::from_document)
            .transpose()
    }

    async fn transactions(&self, user_id: &UserId, limit: Option<usize>) -> AppResult<Vec<Transaction>> {
        let mut query = Query::new()
            .where_eq(transaction::fields::USER_ID, user_id.as_str())
            .order_by(transaction::fields::TIMESTAMP, Direction::Descending);
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        let docs = self.store.query(transaction::COLLECTION, &query).await?;
        Ok(decode_all(&docs))
    }
}

/// Decode transactions, skipping malformed documents.
fn decode_all(docs: &[Document]) -> Vec<Transaction> {
    docs.iter()
        .filter_map(|doc| match Transaction::from_document(doc) {
            Ok(tx) => Some(tx),
            Err(e) => {
                warn!(transaction_id = %doc.id, error = %e, "Skipping malformed transaction");
                None
            }
        })
        .collect()
}
