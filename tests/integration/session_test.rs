//! Integration tests for the machine session lifecycle.

mod helpers;

use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;

use carbonbytes_core::error::ErrorKind;
use carbonbytes_core::events::{DisconnectReason, ReleaseStatus, SessionEvent};
use carbonbytes_core::types::UserId;
use carbonbytes_session::{Phase, SessionSettings};

use helpers::{TestClient, fields, seeded_store, settle, without_refresh};

fn user(id: &str) -> UserId {
    UserId::parse(id).unwrap()
}

// ── Connecting ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_claim_idle_machine() {
    let store = seeded_store();
    let mut client = TestClient::new(&store, "U1", SessionSettings::default());

    let view = client.connect("M1").await;

    assert_eq!(view.phase, Phase::Connected);
    assert_eq!(view.machine_id.as_ref().unwrap(), "M1");
    assert_eq!(view.seconds_remaining, 120);
    assert!(!view.degraded);
    assert!(view.last_error.is_none());
    assert_eq!(view.machine.as_ref().unwrap().display_name(), "Library bin");
    assert_eq!(client.holder("M1"), json!("U1"));
    assert_eq!(client.status("M1"), json!("active"));
    assert!(store.raw("machines", "M1").unwrap().contains_key("lastActive"));

    let connected = client
        .next_event("connected", |e| matches!(e, SessionEvent::Connected { .. }))
        .await;
    assert_eq!(
        connected,
        SessionEvent::Connected {
            machine_id: "M1".parse().unwrap(),
            user_id: user("U1"),
            degraded: false,
            reclaimed: false,
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_machine_held_by_other_user_conflicts() {
    let store = seeded_store();
    let mut first = TestClient::new(&store, "U1", SessionSettings::default());
    first.connect("M1").await;
    let before = store.raw("machines", "M1");

    let mut second = TestClient::new(&store, "U2", SessionSettings::default());
    let view = second.connect("M1").await;

    assert_eq!(view.phase, Phase::Idle);
    assert_eq!(view.last_error.as_ref().unwrap().kind, ErrorKind::Conflict);
    assert_eq!(store.raw("machines", "M1"), before);
    assert_eq!(store.writes_to("machines", "M1").len(), 1, "only U1's claim was written");
    assert!(first.current().is_connected());

    let failed = second
        .next_event("connect failed", |e| matches!(e, SessionEvent::ConnectFailed { .. }))
        .await;
    assert!(matches!(
        failed,
        SessionEvent::ConnectFailed { kind: ErrorKind::Conflict, .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_machine_is_not_found() {
    let store = seeded_store();
    let mut client = TestClient::new(&store, "U1", SessionSettings::default());

    let view = client.connect("M404").await;

    assert_eq!(view.phase, Phase::Idle);
    assert_eq!(view.last_error.as_ref().unwrap().kind, ErrorKind::NotFound);
    assert_eq!(store.write_count(), 0);
    assert!(store.raw("machines", "M404").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_reclaim_own_machine_is_idempotent() {
    let store = seeded_store();
    store.patch(
        "machines",
        "M1",
        fields(json!({"currentSession": "U1", "status": "active"})),
    );
    let mut client = TestClient::new(&store, "U1", SessionSettings::default());

    let view = client.connect("M1").await;

    assert_eq!(view.phase, Phase::Connected);
    assert!(view.last_error.is_none());
    let connected = client
        .next_event("connected", |e| matches!(e, SessionEvent::Connected { .. }))
        .await;
    assert!(matches!(connected, SessionEvent::Connected { reclaimed: true, .. }));
}

#[tokio::test(start_paused = true)]
async fn test_denied_claim_degrades_to_local_session() {
    let store = seeded_store();
    store.deny_writes("machines", Some("M1"));
    let mut client = TestClient::new(&store, "U1", SessionSettings::default());

    let view = client.connect("M1").await;

    assert_eq!(view.phase, Phase::Connected);
    assert!(view.degraded);
    assert_eq!(
        view.last_error.as_ref().unwrap().kind,
        ErrorKind::PermissionDenied
    );
    assert!(view.status_line().contains("[local only]"));
    assert_eq!(client.holder("M1"), json!(null));
    let connected = client
        .next_event("connected", |e| matches!(e, SessionEvent::Connected { .. }))
        .await;
    assert!(matches!(connected, SessionEvent::Connected { degraded: true, .. }));
}

#[tokio::test(start_paused = true)]
async fn test_degraded_session_never_writes_or_resets() {
    let store = seeded_store();
    store.deny_writes("machines", Some("M1"));
    let mut client = TestClient::new(&store, "U1", SessionSettings::default());
    client.connect("M1").await;

    tokio::time::sleep(Duration::from_millis(25_500)).await;

    let view = client.current();
    assert!(view.is_connected());
    assert_eq!(view.seconds_remaining, 95);
    assert_eq!(store.writes_to("machines", "M1").len(), 1, "only the denied claim");

    let view = client
        .view_until("degraded session expired", |v| v.phase == Phase::Idle)
        .await;
    assert!(view.last_error.is_none());
    settle().await;
    assert_eq!(client.release_writes("M1"), 0, "nothing to release");
}

#[tokio::test(start_paused = true)]
async fn test_read_denied_fails_connect() {
    let store = seeded_store();
    store.deny_reads("machines", Some("M1"));
    let mut client = TestClient::new(&store, "U1", SessionSettings::default());

    let view = client.connect("M1").await;

    assert_eq!(view.phase, Phase::Idle);
    assert_eq!(
        view.last_error.as_ref().unwrap().kind,
        ErrorKind::PermissionDenied
    );
    assert_eq!(store.write_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_store_outage_on_connect_is_transient() {
    let store = seeded_store();
    store.fail_next_reads(1);
    let mut client = TestClient::new(&store, "U1", SessionSettings::default());

    let view = client.connect("M1").await;
    assert_eq!(view.last_error.as_ref().unwrap().kind, ErrorKind::Transient);
    assert!(view.last_error.as_ref().unwrap().is_retryable());

    let view = client.connect("M1").await;
    assert_eq!(view.phase, Phase::Connected);
}

// ── Scanning ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_scan_requires_sign_in() {
    let store = seeded_store();
    let mut client = TestClient::anonymous(&store);

    client.controller().start_scan().unwrap();
    let failed = client
        .next_event("connect failed", |e| matches!(e, SessionEvent::ConnectFailed { .. }))
        .await;

    assert!(matches!(
        failed,
        SessionEvent::ConnectFailed { kind: ErrorKind::Authentication, .. }
    ));
    assert_eq!(client.current().phase, Phase::Idle);
    assert_eq!(client.scanner.start_count(), 0);

    client.identity.sign_in(user("U1"));
    let view = client.connect("M1").await;
    assert!(view.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_scanner_failure_returns_to_idle() {
    let store = seeded_store();
    let mut client = TestClient::new(&store, "U1", SessionSettings::default());
    client.scanner.fail_next_start("camera unavailable");

    client.controller().start_scan().unwrap();
    let view = client
        .view_until("scanner failure", |v| v.last_error.is_some())
        .await;

    assert_eq!(view.phase, Phase::Idle);
    assert_eq!(view.last_error.as_ref().unwrap().kind, ErrorKind::Scanner);
    assert!(!client.scanner.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_bad_frames_keep_scanning() {
    let store = seeded_store();
    let mut client = TestClient::new(&store, "U1", SessionSettings::default());
    client.scan().await;

    assert!(client.feeder.fail_frame("blurry"));
    assert!(client.feeder.decode("   "));
    settle().await;

    assert_eq!(client.current().phase, Phase::Scanning);
    assert!(client.scanner.is_active());

    assert!(client.feeder.decode("  M1\n"));
    let view = client.view_until("connected", |v| v.is_connected()).await;
    assert_eq!(view.machine_id.as_ref().unwrap(), "M1");
}

#[tokio::test(start_paused = true)]
async fn test_invalid_code_fails() {
    let store = seeded_store();
    let mut client = TestClient::new(&store, "U1", SessionSettings::default());

    let view = client.connect("machines/M1").await;

    assert_eq!(view.phase, Phase::Idle);
    assert_eq!(view.last_error.as_ref().unwrap().kind, ErrorKind::Validation);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_scanner_stops_after_first_code() {
    let store = seeded_store();
    let mut client = TestClient::new(&store, "U1", SessionSettings::default());

    client.connect("M1").await;
    settle().await;

    assert!(!client.scanner.is_active());
    assert_eq!(client.scanner.stop_count(), 1);
    assert!(!client.feeder.decode("M2"), "later frames have nowhere to go");
    assert_eq!(client.holder("M2"), json!(null));
    assert_eq!(client.current().machine_id.unwrap(), "M1");
}

#[tokio::test(start_paused = true)]
async fn test_cancel_scan_stops_scanner() {
    let store = seeded_store();
    let mut client = TestClient::new(&store, "U1", SessionSettings::default());
    client.scan().await;

    client.controller().cancel_scan().unwrap();
    client
        .next_event("scan cancelled", |e| matches!(e, SessionEvent::ScanCancelled))
        .await;
    settle().await;

    assert_eq!(client.current().phase, Phase::Idle);
    assert!(!client.scanner.is_active());
    assert!(!client.feeder.decode("M1"));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_connect_releases_late_claim() {
    let store = seeded_store();
    store.set_latency(Some(Duration::from_secs(2)));
    let mut client = TestClient::new(&store, "U1", SessionSettings::default());
    client.scan().await;

    assert!(client.feeder.decode("M1"));
    client
        .view_until("connecting", |v| v.phase == Phase::Connecting)
        .await;
    client.controller().cancel_scan().unwrap();
    let view = client.view_until("idle", |v| v.phase == Phase::Idle).await;
    assert!(view.last_error.is_none());

    let released = client
        .next_event("late claim released", |e| matches!(e, SessionEvent::Released { .. }))
        .await;
    assert!(matches!(
        released,
        SessionEvent::Released { outcome: ReleaseStatus::Released, .. }
    ));
    assert_eq!(client.holder("M1"), json!(null));
    assert_eq!(client.status("M1"), json!("idle"));
    assert_eq!(client.current().phase, Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_rescan_after_cancel_keeps_new_claim() {
    let store = seeded_store();
    store.set_latency(Some(Duration::from_secs(1)));
    let mut client = TestClient::new(&store, "U1", SessionSettings::default());
    client.scan().await;
    assert!(client.feeder.decode("M1"));
    client
        .view_until("connecting", |v| v.phase == Phase::Connecting)
        .await;
    client.controller().cancel_scan().unwrap();
    client.view_until("idle", |v| v.phase == Phase::Idle).await;

    let view = client.connect("M1").await;
    assert!(view.is_connected());

    let released = client
        .next_event("abandoned claim settled", |e| matches!(e, SessionEvent::Released { .. }))
        .await;
    assert!(matches!(
        released,
        SessionEvent::Released { outcome: ReleaseStatus::Superseded, .. }
    ));

    tokio::time::sleep(Duration::from_millis(25_500)).await;
    assert!(client.current().is_connected());
    assert_eq!(client.holder("M1"), json!("U1"));
    assert_eq!(client.release_writes("M1"), 0);
}

// ── Connected ───────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_countdown_decrements_each_second() {
    let store = seeded_store();
    let mut client = TestClient::new(&store, "U1", without_refresh());
    client.connect("M1").await;

    tokio::time::sleep(Duration::from_millis(5_500)).await;
    assert_eq!(client.current().seconds_remaining, 115);

    tokio::time::sleep(Duration::from_secs(60)).await;
    let view = client.current();
    assert_eq!(view.seconds_remaining, 55);
    assert_eq!(view.countdown(), "0:55");
}

#[tokio::test(start_paused = true)]
async fn test_session_expires_and_releases() {
    let store = seeded_store();
    let mut client = TestClient::new(&store, "U1", without_refresh());
    client.connect("M1").await;
    let started = Instant::now();

    let view = client
        .view_until("expired", |v| v.phase == Phase::Idle)
        .await;
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(119) && elapsed <= Duration::from_secs(121));
    assert!(view.last_error.is_none());
    assert_eq!(view.seconds_remaining, 0);

    let disconnected = client
        .next_event("disconnected", |e| matches!(e, SessionEvent::Disconnected { .. }))
        .await;
    assert!(matches!(
        disconnected,
        SessionEvent::Disconnected { reason: DisconnectReason::Expired, .. }
    ));
    client
        .next_event("released", |e| matches!(e, SessionEvent::Released { .. }))
        .await;
    assert_eq!(client.holder("M1"), json!(null));
    assert_eq!(client.status("M1"), json!("idle"));
}

#[tokio::test(start_paused = true)]
async fn test_session_expires_when_heartbeats_fail() {
    let store = seeded_store();
    let mut client = TestClient::new(&store, "U1", SessionSettings::default());
    client.connect("M1").await;
    store.fail_next_writes(100);

    let view = client
        .view_until("expired", |v| v.phase == Phase::Idle)
        .await;
    assert!(view.last_error.is_none(), "refresh failures are not surfaced");

    let released = client
        .next_event("release attempted", |e| matches!(e, SessionEvent::Released { .. }))
        .await;
    assert!(matches!(
        released,
        SessionEvent::Released { outcome: ReleaseStatus::Failed { .. }, .. }
    ));
    // The failed release leaves the stored claim behind.
    assert_eq!(client.holder("M1"), json!("U1"));
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_resets_countdown() {
    let store = seeded_store();
    let mut client = TestClient::new(&store, "U1", SessionSettings::default());
    client.connect("M1").await;

    tokio::time::sleep(Duration::from_millis(9_500)).await;
    assert_eq!(client.current().seconds_remaining, 111);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(client.current().seconds_remaining, 115);
    assert!(client
        .drain_events()
        .iter()
        .any(|e| matches!(e, SessionEvent::Refreshed { .. })));

    let heartbeats: Vec<_> = store
        .writes_to("machines", "M1")
        .into_iter()
        .skip(1)
        .collect();
    assert_eq!(heartbeats.len(), 1);
    assert!(heartbeats[0].applied());
    assert_eq!(
        heartbeats[0].fields.keys().collect::<Vec<_>>(),
        ["lastActive"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_heartbeat_keeps_session() {
    let store = seeded_store();
    let mut client = TestClient::new(&store, "U1", SessionSettings::default());
    client.connect("M1").await;
    store.fail_next_writes(1);

    tokio::time::sleep(Duration::from_millis(10_500)).await;
    let view = client.current();
    assert!(view.is_connected());
    assert!(view.last_error.is_none());
    assert_eq!(view.seconds_remaining, 110);
    let failed = client
        .next_event("refresh failed", |e| matches!(e, SessionEvent::RefreshFailed { .. }))
        .await;
    assert!(matches!(
        failed,
        SessionEvent::RefreshFailed { kind: ErrorKind::Transient, .. }
    ));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(client.current().seconds_remaining, 120);
}

#[tokio::test(start_paused = true)]
async fn test_failed_heartbeat_read_keeps_session() {
    let store = seeded_store();
    let settings = SessionSettings {
        live_updates: false,
        ..SessionSettings::default()
    };
    let mut client = TestClient::new(&store, "U1", settings);
    client.connect("M1").await;
    store.fail_next_reads(1);

    tokio::time::sleep(Duration::from_millis(10_500)).await;
    assert!(client.current().is_connected());
    client
        .next_event("refresh failed", |e| matches!(e, SessionEvent::RefreshFailed { .. }))
        .await;
    assert_eq!(client.release_writes("M1"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_refresher_detects_takeover() {
    let store = seeded_store();
    let settings = SessionSettings {
        live_updates: false,
        ..SessionSettings::default()
    };
    let mut client = TestClient::new(&store, "U1", settings);
    client.connect("M1").await;
    let started = Instant::now();

    store.patch("machines", "M1", fields(json!({"currentSession": "U2"})));

    let view = client
        .view_until("ownership lost", |v| v.phase == Phase::Idle)
        .await;
    assert!(started.elapsed() <= Duration::from_secs(11));
    assert_eq!(
        view.last_error.as_ref().unwrap().kind,
        ErrorKind::StaleOwnership
    );

    let disconnected = client
        .next_event("disconnected", |e| matches!(e, SessionEvent::Disconnected { .. }))
        .await;
    assert_eq!(
        disconnected,
        SessionEvent::Disconnected {
            machine_id: "M1".parse().unwrap(),
            reason: DisconnectReason::OwnershipLost {
                holder: Some(user("U2")),
            },
        }
    );

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(
        store.writes_to("machines", "M1").len(),
        1,
        "no writes after the claim"
    );
    assert_eq!(client.holder("M1"), json!("U2"));
}

#[tokio::test(start_paused = true)]
async fn test_live_update_detects_takeover_immediately() {
    let store = seeded_store();
    let mut client = TestClient::new(&store, "U1", without_refresh());
    client.connect("M1").await;
    let started = Instant::now();

    store.patch("machines", "M1", fields(json!({"currentSession": "U2"})));
    let view = client
        .view_until("ownership lost", |v| v.phase == Phase::Idle)
        .await;

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(
        view.last_error.as_ref().unwrap().kind,
        ErrorKind::StaleOwnership
    );
    settle().await;
    assert_eq!(client.release_writes("M1"), 0);
    assert_eq!(client.holder("M1"), json!("U2"));
}

#[tokio::test(start_paused = true)]
async fn test_deleted_machine_ends_session() {
    let store = seeded_store();
    let mut client = TestClient::new(&store, "U1", without_refresh());
    client.connect("M1").await;

    assert!(store.delete("machines", "M1"));
    let view = client
        .view_until("machine deleted", |v| v.phase == Phase::Idle)
        .await;

    assert_eq!(view.last_error.as_ref().unwrap().kind, ErrorKind::NotFound);
    let disconnected = client
        .next_event("disconnected", |e| matches!(e, SessionEvent::Disconnected { .. }))
        .await;
    assert!(matches!(
        disconnected,
        SessionEvent::Disconnected { reason: DisconnectReason::MachineDeleted, .. }
    ));
    assert!(store.raw("machines", "M1").is_none(), "not recreated by a release");
}

#[tokio::test(start_paused = true)]
async fn test_live_updates_refresh_snapshot() {
    let store = seeded_store();
    let mut client = TestClient::new(&store, "U1", without_refresh());
    client.connect("M1").await;

    store.patch("machines", "M1", fields(json!({"name": "Cafeteria bin"})));
    let view = client
        .view_until("renamed", |v| {
            v.machine
                .as_ref()
                .is_some_and(|m| m.display_name() == "Cafeteria bin")
        })
        .await;
    assert!(view.is_connected());
}

// ── Leaving ─────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_disconnect_releases_machine() {
    let store = seeded_store();
    let mut client = TestClient::new(&store, "U1", SessionSettings::default());
    client.connect("M1").await;

    client.controller().disconnect().unwrap();
    let view = client.view_until("idle", |v| v.phase == Phase::Idle).await;
    assert!(view.machine_id.is_none());
    assert!(view.last_error.is_none());

    let released = client
        .next_event("released", |e| matches!(e, SessionEvent::Released { .. }))
        .await;
    assert!(matches!(
        released,
        SessionEvent::Released { outcome: ReleaseStatus::Released, .. }
    ));
    assert_eq!(client.holder("M1"), json!(null));
    assert_eq!(client.status("M1"), json!("idle"));

    // Timers are gone: nothing ticks or writes afterwards.
    let writes = store.write_count();
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(store.write_count(), writes);
    assert_eq!(client.current().phase, Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_new_session_after_disconnect_is_not_hit_by_old_timers() {
    let store = seeded_store();
    let mut client = TestClient::new(&store, "U1", without_refresh());
    client.connect("M1").await;
    tokio::time::sleep(Duration::from_millis(30_500)).await;

    client.controller().disconnect().unwrap();
    client.view_until("idle", |v| v.phase == Phase::Idle).await;
    let view = client.connect("M2").await;
    assert_eq!(view.seconds_remaining, 120);

    tokio::time::sleep(Duration::from_millis(3_500)).await;
    assert_eq!(client.current().seconds_remaining, 117);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_same_machine_while_release_pending() {
    let store = seeded_store();
    let mut client = TestClient::new(&store, "U1", SessionSettings::default());
    client.connect("M1").await;
    store.set_latency(Some(Duration::from_secs(1)));

    client.controller().disconnect().unwrap();
    client.view_until("idle", |v| v.phase == Phase::Idle).await;
    let view = client.connect("M1").await;
    assert!(view.is_connected());

    let events = client.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        SessionEvent::Released { outcome: ReleaseStatus::Released, .. }
    )));
    let reconnect = events
        .iter()
        .rev()
        .find(|e| matches!(e, SessionEvent::Connected { .. }));
    assert!(matches!(
        reconnect,
        Some(SessionEvent::Connected { reclaimed: false, .. })
    ));

    tokio::time::sleep(Duration::from_millis(25_500)).await;
    assert!(client.current().is_connected());
    assert_eq!(client.holder("M1"), json!("U1"));
    assert_eq!(client.release_writes("M1"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unmount_releases_once() {
    let store = seeded_store();
    let mut client = TestClient::new(&store, "U1", SessionSettings::default());
    client.connect("M1").await;

    client.unmount().await;
    settle().await;

    assert_eq!(client.release_writes("M1"), 1);
    assert_eq!(client.holder("M1"), json!(null));
    let events = client.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        SessionEvent::Disconnected { reason: DisconnectReason::Unmounted, .. }
    )));
}

#[tokio::test(start_paused = true)]
async fn test_unmount_survives_failed_release() {
    let store = seeded_store();
    let mut client = TestClient::new(&store, "U1", SessionSettings::default());
    client.connect("M1").await;
    store.fail_next_writes(1);

    client.unmount().await;
    settle().await;

    assert_eq!(client.release_writes("M1"), 1);
    assert_eq!(client.holder("M1"), json!("U1"));
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handle_releases() {
    let store = seeded_store();
    let mut client = TestClient::new(&store, "U1", SessionSettings::default());
    client.connect("M1").await;

    client.drop_controller();
    settle().await;
    settle().await;

    assert_eq!(client.holder("M1"), json!(null));
    assert_eq!(client.release_writes("M1"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unmount_during_connect_releases_late_claim() {
    let store = seeded_store();
    store.set_latency(Some(Duration::from_secs(1)));
    let mut client = TestClient::new(&store, "U1", SessionSettings::default());
    client.scan().await;
    assert!(client.feeder.decode("M1"));
    client
        .view_until("connecting", |v| v.phase == Phase::Connecting)
        .await;

    client.unmount().await;
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(client.holder("M1"), json!(null));
    assert_eq!(client.release_writes("M1"), 1);
}
