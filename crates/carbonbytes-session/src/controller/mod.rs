//! Session controller handle.
//!
//! [`SessionController::spawn`] mounts a controller: it starts the task
//! that owns the session state and returns the handle the presentation
//! layer uses to issue intents and observe the session. Dropping the handle
//! unmounts the controller.

mod actor;
mod ledger;
mod message;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use carbonbytes_core::config::scanner::ScannerConfig;
use carbonbytes_core::config::session::SessionConfig;
use carbonbytes_core::error::AppError;
use carbonbytes_core::events::SessionEvent;
use carbonbytes_core::result::AppResult;
use carbonbytes_core::traits::{CodeSource, DocumentStore, IdentityProvider, ScanOptions};

use crate::state::SessionView;

use self::actor::SessionActor;
use self::message::Message;

/// Event buffer per subscriber before the slowest starts lagging.
const EVENT_CAPACITY: usize = 64;

/// Collaborators injected into a controller.
#[derive(Debug, Clone)]
pub struct SessionDeps {
    /// Shared document store.
    pub store: Arc<dyn DocumentStore>,
    /// Who is signed in.
    pub identity: Arc<dyn IdentityProvider>,
    /// Camera and decoder.
    pub code_source: Arc<dyn CodeSource>,
}

/// Timing and scanner options of a controller.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// Countdown start value, in ticks.
    pub session_length: u32,
    /// Length of one countdown tick.
    pub countdown_tick: Duration,
    /// Activity refresher period.
    pub refresh_interval: Duration,
    /// Subscribe to the claimed machine while connected.
    pub live_updates: bool,
    /// Options handed to the code source.
    pub scan_options: ScanOptions,
}

impl SessionSettings {
    /// Build settings from configuration sections.
    pub fn from_config(session: &SessionConfig, scanner: &ScannerConfig) -> Self {
        Self {
            session_length: session.session_length_seconds,
            countdown_tick: session.countdown_tick(),
            refresh_interval: session.refresh_interval(),
            live_updates: session.live_updates,
            scan_options: ScanOptions::from(scanner),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default(), &ScannerConfig::default())
    }
}

/// Handle to a mounted session controller.
#[derive(Debug)]
pub struct SessionController {
    tx: mpsc::UnboundedSender<Message>,
    view: watch::Receiver<SessionView>,
    events: broadcast::Sender<SessionEvent>,
    task: Option<JoinHandle<()>>,
}

impl SessionController {
    /// Mount a controller. Must be called within a tokio runtime.
    pub fn spawn(deps: SessionDeps, settings: SessionSettings) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (view_tx, view) = watch::channel(SessionView::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let actor = SessionActor::new(deps, settings, tx.clone(), view_tx, events.clone());
        let task = tokio::spawn(actor.run(rx));

        Self {
            tx,
            view,
            events,
            task: Some(task),
        }
    }

    fn send(&self, message: Message) -> AppResult<()> {
        self.tx
            .send(message)
            .map_err(|_| AppError::internal("Session controller has stopped"))
    }

    /// Open the code source. Requires a signed-in user.
    pub fn start_scan(&self) -> AppResult<()> {
        self.send(Message::StartScan)
    }

    /// Stop scanning, or abandon a connect attempt in flight.
    pub fn cancel_scan(&self) -> AppResult<()> {
        self.send(Message::CancelScan)
    }

    /// End the current session and release the machine.
    pub fn disconnect(&self) -> AppResult<()> {
        self.send(Message::Disconnect)
    }

    /// Tear the controller down and wait for its task to finish.
    ///
    /// A held claim is released in the background; this does not wait for
    /// the release.
    pub async fn unmount(mut self) {
        let _ = self.tx.send(Message::Unmount);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Current view.
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Receiver that sees every published view.
    pub fn watch(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Subscribe to session events.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Whether the controller task is still running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        let _ = self.tx.send(Message::Unmount);
    }
}
