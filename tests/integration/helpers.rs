//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::{broadcast, watch};

use carbonbytes_core::events::SessionEvent;
use carbonbytes_core::traits::SharedIdentity;
use carbonbytes_core::types::{Fields, UserId};
use carbonbytes_session::{
    CodeFeeder, ManualCodeSource, SessionController, SessionDeps, SessionSettings, SessionView,
};
use carbonbytes_store::MemoryDocumentStore;

/// Upper bound on any wait, in (usually paused) tokio time.
pub const WAIT: Duration = Duration::from_secs(600);

/// A store holding idle machines `M1` and `M2` and users `U1`, `U2`.
pub fn seeded_store() -> MemoryDocumentStore {
    let store = MemoryDocumentStore::default();
    store
        .seed(&json!({
            "machines": {
                "M1": {"currentSession": null, "status": "idle", "name": "Library bin"},
                "M2": {"currentSession": null, "status": "idle"}
            },
            "users": {
                "U1": {"displayName": "Ada", "points": 40},
                "U2": {"displayName": "Grace", "points": 75}
            }
        }))
        .expect("seed data is valid");
    store
}

/// Build a field map from a JSON object literal.
pub fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Default settings with the refresher pushed past the session length.
pub fn without_refresh() -> SessionSettings {
    SessionSettings {
        refresh_interval: Duration::from_secs(1000),
        ..SessionSettings::default()
    }
}

/// Let spawned background work (releases, forwarders) run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// A mounted controller plus the fakes behind it.
pub struct TestClient {
    /// Shared store.
    pub store: MemoryDocumentStore,
    /// Camera stand-in.
    pub scanner: ManualCodeSource,
    /// Feeds decoded codes to the running scan.
    pub feeder: CodeFeeder,
    /// Who is signed in.
    pub identity: SharedIdentity,
    /// View updates.
    pub view: watch::Receiver<SessionView>,
    /// Controller events.
    pub events: broadcast::Receiver<SessionEvent>,
    controller: Option<SessionController>,
}

impl TestClient {
    /// Mount a controller for `user` over `store`.
    pub fn new(store: &MemoryDocumentStore, user: &str, settings: SessionSettings) -> Self {
        let identity = SharedIdentity::signed_in(UserId::parse(user).expect("valid user id"));
        Self::with_identity(store, identity, settings)
    }

    /// Mount a controller with nobody signed in.
    pub fn anonymous(store: &MemoryDocumentStore) -> Self {
        Self::with_identity(store, SharedIdentity::anonymous(), SessionSettings::default())
    }

    fn with_identity(
        store: &MemoryDocumentStore,
        identity: SharedIdentity,
        settings: SessionSettings,
    ) -> Self {
        let (scanner, feeder) = ManualCodeSource::new();
        let controller = SessionController::spawn(
            SessionDeps {
                store: Arc::new(store.clone()),
                identity: Arc::new(identity.clone()),
                code_source: Arc::new(scanner.clone()),
            },
            settings,
        );
        Self {
            store: store.clone(),
            scanner,
            feeder,
            identity,
            view: controller.watch(),
            events: controller.events(),
            controller: Some(controller),
        }
    }

    /// The mounted controller.
    pub fn controller(&self) -> &SessionController {
        self.controller.as_ref().expect("controller is mounted")
    }

    /// Unmount and wait for the controller task to stop.
    pub async fn unmount(&mut self) {
        if let Some(controller) = self.controller.take() {
            controller.unmount().await;
        }
    }

    /// Drop the handle without awaiting the task.
    pub fn drop_controller(&mut self) {
        self.controller = None;
    }

    /// Start scanning and wait until the code source is open.
    pub async fn scan(&mut self) {
        self.controller().start_scan().expect("controller running");
        self.next_event("scan started", |e| matches!(e, SessionEvent::ScanStarted))
            .await;
    }

    /// Scan `code` and wait until the attempt settles as connected or idle.
    pub async fn connect(&mut self, code: &str) -> SessionView {
        self.scan().await;
        assert!(self.feeder.decode(code), "scanner should be running");
        self.view_until("connect attempt settled", |v| {
            v.is_connected() || v.last_error.is_some()
        })
        .await
    }

    /// Current view.
    pub fn current(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Wait until the view satisfies `pred`.
    pub async fn view_until(
        &mut self,
        what: &str,
        pred: impl Fn(&SessionView) -> bool,
    ) -> SessionView {
        let view = &mut self.view;
        let wait = async {
            loop {
                {
                    let current = view.borrow_and_update();
                    if pred(&current) {
                        return current.clone();
                    }
                }
                if view.changed().await.is_err() {
                    panic!("controller stopped while waiting for {what}");
                }
            }
        };
        tokio::time::timeout(WAIT, wait)
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
    }

    /// Wait for the next event satisfying `pred`, skipping others.
    pub async fn next_event(
        &mut self,
        what: &str,
        pred: impl Fn(&SessionEvent) -> bool,
    ) -> SessionEvent {
        let events = &mut self.events;
        let wait = async {
            loop {
                match events.recv().await {
                    Ok(event) if pred(&event) => return event,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => {
                        panic!("event stream closed while waiting for {what}")
                    }
                }
            }
        };
        tokio::time::timeout(WAIT, wait)
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
    }

    /// Events received so far, without waiting.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) => out.push(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        out
    }

    /// `currentSession` of a machine as stored.
    pub fn holder(&self, machine: &str) -> Value {
        self.store
            .raw("machines", machine)
            .and_then(|f| f.get("currentSession").cloned())
            .unwrap_or(Value::Null)
    }

    /// `status` of a machine as stored.
    pub fn status(&self, machine: &str) -> Value {
        self.store
            .raw("machines", machine)
            .and_then(|f| f.get("status").cloned())
            .unwrap_or(Value::Null)
    }

    /// Release writes (holder set to null) issued against a machine.
    pub fn release_writes(&self, machine: &str) -> usize {
        self.store
            .writes_to("machines", machine)
            .iter()
            .filter(|w| w.fields.get("currentSession") == Some(&Value::Null))
            .count()
    }
}
