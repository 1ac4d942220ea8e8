//! Points leaderboard.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;
use serde::Serialize;
use tracing::warn;

use carbonbytes_core::result::AppResult;
use carbonbytes_core::traits::DocumentStore;
use carbonbytes_core::types::{Direction, Document, Query, UserId};
use carbonbytes_entity::user::{self, UserProfile};

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    /// 1-based position.
    pub rank: usize,
    /// The user.
    pub user_id: UserId,
    /// Name shown on the board.
    pub display_name: String,
    /// Points balance.
    pub points: i64,
    /// Avatar URL.
    pub photo_url: Option<String>,
}

/// Ranks users by their points balance.
#[derive(Debug, Clone)]
pub struct LeaderboardService {
    store: Arc<dyn DocumentStore>,
    size: usize,
}

impl LeaderboardService {
    /// Creates a new leaderboard service showing `size` users.
    pub fn new(store: Arc<dyn DocumentStore>, size: usize) -> Self {
        Self { store, size }
    }

    fn query(&self) -> Query {
        Query::new()
            .order_by(user::fields::POINTS, Direction::Descending)
            .limit(self.size)
    }

    /// The current top users.
    pub async fn top(&self) -> AppResult<Vec<LeaderboardEntry>> {
        let docs = self.store.query(user::COLLECTION, &self.query()).await?;
        Ok(rank(&docs))
    }

    /// Live leaderboard: the current ranking, then a new one on every change.
    pub async fn watch(&self) -> AppResult<BoxStream<'static, AppResult<Vec<LeaderboardEntry>>>> {
        let sub = self
            .store
            .watch_query(user::COLLECTION, &self.query())
            .await?;
        Ok(sub
            .map(|snapshot| snapshot.map(|docs| rank(&docs)))
            .boxed())
    }
}

/// Turn ordered `users` documents into ranked rows.
///
/// Documents that fail to decode are skipped and do not take a rank.
pub fn rank(docs: &[Document]) -> Vec<LeaderboardEntry> {
    docs.iter()
        .filter_map(|doc| match UserProfile::from_document(doc) {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(user_id = %doc.id, error = %e, "Skipping malformed user on leaderboard");
                None
            }
        })
        .enumerate()
        .map(|(i, profile)| LeaderboardEntry {
            rank: i + 1,
            display_name: profile.display_name().to_string(),
            user_id: profile.id,
            points: profile.points,
            photo_url: profile.photo_url,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use carbonbytes_store::MemoryDocumentStore;
    use serde_json::json;

    fn seeded() -> MemoryDocumentStore {
        let store = MemoryDocumentStore::default();
        store
            .seed(&json!({
                "users": {
                    "U1": {"displayName": "Ada", "points": 120},
                    "U2": {"displayName": "Grace", "points": 300},
                    "U3": {"points": 80},
                    "U4": {"displayName": "Linus", "points": 5}
                }
            }))
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_top_is_ranked_by_points() {
        let store = seeded();
        let board = LeaderboardService::new(Arc::new(store), 3).top().await.unwrap();

        let rows: Vec<_> = board
            .iter()
            .map(|e| (e.rank, e.display_name.as_str(), e.points))
            .collect();
        assert_eq!(rows, [(1, "Grace", 300), (2, "Ada", 120), (3, "U3", 80)]);
    }

    #[tokio::test]
    async fn test_watch_reranks_on_change() {
        let store = seeded();
        let service = LeaderboardService::new(Arc::new(store.clone()), 2);
        let mut feed = service.watch().await.unwrap();

        let first = feed.next().await.unwrap().unwrap();
        assert_eq!(first[0].user_id.as_str(), "U2");

        let serde_json::Value::Object(fields) = json!({"points": 999}) else {
            unreachable!()
        };
        store.patch("users", "U4", fields);
        let second = feed.next().await.unwrap().unwrap();
        assert_eq!(second[0].user_id.as_str(), "U4");
        assert_eq!(second[1].user_id.as_str(), "U2");
    }
}
