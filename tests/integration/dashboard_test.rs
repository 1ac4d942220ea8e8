//! Integration tests for sign-in, dashboard statistics and the leaderboard.

mod helpers;

use std::sync::Arc;

use futures::StreamExt;
use serde_json::json;

use carbonbytes_core::config::DashboardConfig;
use carbonbytes_core::error::ErrorKind;
use carbonbytes_core::types::UserId;
use carbonbytes_entity::transaction::WasteType;
use carbonbytes_entity::user::NewUser;
use carbonbytes_service::{DashboardService, LeaderboardService, UserService};
use carbonbytes_store::MemoryDocumentStore;

use helpers::{fields, seeded_store};

fn with_transactions(store: &MemoryDocumentStore) {
    for (id, user, waste, points, day) in [
        ("T1", "U1", "plastic", 10, 1),
        ("T2", "U1", "glass", 15, 2),
        ("T3", "U2", "metal", 20, 3),
        ("T4", "U1", "plastic", 10, 4),
        ("T5", "U1", "batteries", 5, 5),
    ] {
        store.insert(
            "transactions",
            id,
            fields(json!({
                "userId": user,
                "machineId": "M1",
                "wasteType": waste,
                "points": points,
                "timestamp": format!("2026-03-{day:02}T12:00:00Z"),
            })),
        );
    }
}

#[tokio::test]
async fn test_new_user_starts_on_leaderboard_with_zero() {
    let store = seeded_store();
    let users = UserService::new(Arc::new(store.clone()));

    let profile = users
        .sign_in(&NewUser {
            id: UserId::parse("U3").unwrap(),
            display_name: Some("Linus".into()),
            email: None,
            photo_url: None,
        })
        .await
        .unwrap();
    assert_eq!(profile.points, 0);

    let board = LeaderboardService::new(Arc::new(store), 50).top().await.unwrap();
    let names: Vec<_> = board.iter().map(|e| e.display_name.as_str()).collect();
    assert_eq!(names, ["Grace", "Ada", "Linus"]);
    assert_eq!(board[2].rank, 3);
}

#[tokio::test]
async fn test_dashboard_and_profile_agree() {
    let store = seeded_store();
    with_transactions(&store);
    let service = DashboardService::new(Arc::new(store), DashboardConfig::default());
    let user = UserId::parse("U1").unwrap();

    let summary = service.summary(&user).await.unwrap();
    assert_eq!(summary.points, 40);
    let ids: Vec<_> = summary.recent.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["T5", "T4", "T2", "T1"]);
    assert_eq!(summary.recent[0].waste_type, WasteType::Other);

    let stats = service.profile_stats(&user).await.unwrap();
    assert_eq!(stats.total_items, 4);
    assert_eq!(stats.total_points, 40);
    assert_eq!(stats.waste, summary.waste);
    assert_eq!(stats.waste.get(WasteType::Plastic), 2);
}

#[tokio::test]
async fn test_dashboard_surfaces_read_denial() {
    let store = seeded_store();
    store.deny_reads("users", None);
    let service = DashboardService::new(Arc::new(store), DashboardConfig::default());

    let err = service
        .summary(&UserId::parse("U1").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::PermissionDenied);
}

#[tokio::test]
async fn test_live_leaderboard_follows_points() {
    let store = seeded_store();
    let board = LeaderboardService::new(Arc::new(store.clone()), 50);
    let mut feed = board.watch().await.unwrap();

    let first = feed.next().await.unwrap().unwrap();
    assert_eq!(first[0].user_id.as_str(), "U2");

    store.patch("users", "U1", fields(json!({"points": 500})));
    let next = feed.next().await.unwrap().unwrap();
    assert_eq!(next[0].user_id.as_str(), "U1");
    assert_eq!(next[0].points, 500);
    assert_eq!(next[1].rank, 2);
}
