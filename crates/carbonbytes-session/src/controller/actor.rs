//! The controller task: owns [`ClientSessionState`] and applies every
//! transition. Store calls, code-source calls and timers run in spawned
//! tasks and report back through the inbox, so each handler below runs to
//! completion without suspending.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use carbonbytes_core::error::AppError;
use carbonbytes_core::events::{DisconnectReason, SessionEvent};
use carbonbytes_core::result::AppResult;
use carbonbytes_core::traits::{ScanCallback, ScanEvent, ScanHandle};
use carbonbytes_core::types::{Document, MachineId, UserId};
use carbonbytes_entity::machine::{self, MachineRecord};

use super::ledger::ClaimLedger;
use super::message::Message;
use super::{SessionDeps, SessionSettings};
use crate::claim::{ClaimOutcome, ClaimProtocol, OwnershipCheck, RefreshOutcome, decode_snapshot};
use crate::state::{ClientSessionState, FailureReason, MachineSnapshot, Phase, SessionView};
use crate::timer::ScheduledTask;

pub(crate) struct SessionActor {
    deps: SessionDeps,
    claims: ClaimProtocol,
    ledger: ClaimLedger,
    settings: SessionSettings,
    state: ClientSessionState,
    /// User of the current scan, connect attempt or session.
    user: Option<UserId>,
    /// Bumped whenever an attempt or session ends or a new one begins.
    generation: u64,
    /// Bumped whenever the countdown is re-armed.
    countdown_epoch: u64,
    scan: Option<ScanHandle>,
    countdown: Option<ScheduledTask>,
    refresher: Option<ScheduledTask>,
    subscription: Option<ScheduledTask>,
    refresh_in_flight: bool,
    tx: mpsc::UnboundedSender<Message>,
    view: watch::Sender<SessionView>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionActor {
    pub(crate) fn new(
        deps: SessionDeps,
        settings: SessionSettings,
        tx: mpsc::UnboundedSender<Message>,
        view: watch::Sender<SessionView>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            claims: ClaimProtocol::new(Arc::clone(&deps.store)),
            ledger: ClaimLedger::default(),
            deps,
            settings,
            state: ClientSessionState::default(),
            user: None,
            generation: 0,
            countdown_epoch: 0,
            scan: None,
            countdown: None,
            refresher: None,
            subscription: None,
            refresh_in_flight: false,
            tx,
            view,
            events,
        }
    }

    pub(crate) async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Message>) {
        debug!("Session controller started");
        while let Some(message) = rx.recv().await {
            if let Message::Unmount = message {
                self.unmount();
                break;
            }
            self.handle(message);
        }

        // Claims that landed after unmount still need releasing. Closing
        // first makes any connect task still running release on its own.
        rx.close();
        while let Ok(message) = rx.try_recv() {
            if let Message::ClaimResolved {
                generation,
                machine_id,
                user,
                result: Ok(ClaimOutcome::Claimed { .. }),
            } = message
            {
                self.spawn_release(machine_id, user, generation);
            }
        }
        debug!("Session controller stopped");
    }

    fn handle(&mut self, message: Message) {
        match message {
            Message::StartScan => self.start_scan(),
            Message::CancelScan => self.cancel(),
            Message::Disconnect => self.disconnect(),
            Message::Unmount => self.unmount(),
            Message::ScanOpened { generation, result } => self.on_scan_opened(generation, result),
            Message::Scan { generation, event } => self.on_scan_event(generation, event),
            Message::ClaimResolved {
                generation,
                machine_id,
                user,
                result,
            } => self.on_claim_resolved(generation, machine_id, user, result),
            Message::CountdownTick { generation, epoch } => {
                self.on_countdown_tick(generation, epoch)
            }
            Message::RefreshTick { generation } => self.on_refresh_tick(generation),
            Message::RefreshResolved {
                generation,
                outcome,
            } => self.on_refresh_resolved(generation, outcome),
            Message::Snapshot { generation, result } => self.on_snapshot(generation, result),
        }
    }

    fn is_current(&self, generation: u64, phase: Phase) -> bool {
        generation == self.generation && self.state.phase == phase
    }

    fn publish(&self) {
        self.view.send_replace(self.state.view());
    }

    fn emit(&self, event: SessionEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    // ── Intents ─────────────────────────────────────────────

    fn start_scan(&mut self) {
        if self.state.phase != Phase::Idle {
            debug!(phase = %self.state.phase, "Start scan ignored");
            return;
        }
        let Some(user) = self.deps.identity.current_user() else {
            let err = AppError::authentication("Sign in before scanning a machine");
            self.state.last_error = Some(err.clone());
            self.publish();
            self.emit(SessionEvent::ConnectFailed {
                machine_id: None,
                kind: err.kind,
                message: err.message,
            });
            return;
        };

        self.generation += 1;
        let generation = self.generation;
        self.user = Some(user);
        self.state.phase = Phase::Scanning;
        self.state.last_error = None;
        self.publish();

        let inbox = self.tx.clone();
        let callback: ScanCallback = Arc::new(move |event| {
            let _ = inbox.send(Message::Scan { generation, event });
        });
        let source = Arc::clone(&self.deps.code_source);
        let options = self.settings.scan_options.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = source.start(&options, callback).await;
            if let Err(mpsc::error::SendError(Message::ScanOpened {
                result: Ok(handle), ..
            })) = tx.send(Message::ScanOpened { generation, result })
            {
                // Controller is gone; do not leave the camera running.
                let _ = source.stop(handle).await;
            }
        });
        debug!(generation, "Scanning");
    }

    fn cancel(&mut self) {
        match self.state.phase {
            Phase::Scanning => {
                self.stop_scanner();
                info!("Scan cancelled");
            }
            Phase::Connecting => {
                info!(machine_id = ?self.state.machine_id, "Connect abandoned");
            }
            phase => {
                debug!(%phase, "Cancel ignored");
                return;
            }
        }
        self.generation += 1;
        self.state.reset();
        self.state.last_error = None;
        self.publish();
        self.emit(SessionEvent::ScanCancelled);
    }

    fn disconnect(&mut self) {
        match self.state.phase {
            Phase::Connected => self.end_session(DisconnectReason::UserRequested, None, true),
            Phase::Scanning | Phase::Connecting => self.cancel(),
            phase => debug!(%phase, "Disconnect ignored"),
        }
    }

    fn unmount(&mut self) {
        match self.state.phase {
            Phase::Connected => self.end_session(DisconnectReason::Unmounted, None, true),
            Phase::Scanning => self.stop_scanner(),
            _ => {}
        }
        self.generation += 1;
        info!("Session controller unmounted");
    }

    // ── Scanning ────────────────────────────────────────────

    fn on_scan_opened(&mut self, generation: u64, result: AppResult<ScanHandle>) {
        let current = self.is_current(generation, Phase::Scanning);
        match result {
            Ok(handle) if current => {
                self.scan = Some(handle);
                self.emit(SessionEvent::ScanStarted);
            }
            Ok(handle) => self.stop_handle(handle),
            Err(e) if current => {
                warn!(error = %e, "Code source failed to start");
                self.fail(None, e);
            }
            Err(e) => debug!(error = %e, "Stale code source failure ignored"),
        }
    }

    fn on_scan_event(&mut self, generation: u64, event: ScanEvent) {
        if !self.is_current(generation, Phase::Scanning) {
            return;
        }
        let raw = match event {
            ScanEvent::Decoded(raw) => raw,
            ScanEvent::Error(message) => {
                debug!(error = %message, "Frame not decoded");
                return;
            }
        };
        let code = raw.trim();
        if code.is_empty() {
            return;
        }

        self.stop_scanner();
        match MachineId::parse(code) {
            Ok(machine_id) => self.begin_connect(machine_id),
            Err(e) => {
                debug!(code, error = %e, "Decoded text is not a machine id");
                self.fail(
                    None,
                    AppError::validation(format!("'{code}' is not a machine code")),
                );
            }
        }
    }

    fn stop_scanner(&mut self) {
        if let Some(handle) = self.scan.take() {
            self.stop_handle(handle);
        }
    }

    fn stop_handle(&self, handle: ScanHandle) {
        let source = Arc::clone(&self.deps.code_source);
        tokio::spawn(async move {
            if let Err(e) = source.stop(handle).await {
                warn!(error = %e, "Failed to stop code source");
            }
        });
    }

    // ── Connecting ──────────────────────────────────────────

    fn begin_connect(&mut self, machine_id: MachineId) {
        let Some(user) = self.user.clone() else {
            self.fail(
                Some(machine_id),
                AppError::authentication("Sign in before connecting to a machine"),
            );
            return;
        };

        self.generation += 1;
        let generation = self.generation;
        self.state.phase = Phase::Connecting;
        self.state.machine_id = Some(machine_id.clone());
        self.state.last_error = None;
        self.publish();
        info!(machine_id = %machine_id, user_id = %user, generation, "Connecting");

        let claims = self.claims.clone();
        let ledger = self.ledger.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = ledger.claim(&claims, &machine_id, &user, generation).await;
            let claimed = matches!(result, Ok(ClaimOutcome::Claimed { .. }));
            let message = Message::ClaimResolved {
                generation,
                machine_id: machine_id.clone(),
                user: user.clone(),
                result,
            };
            if tx.send(message).is_err() && claimed {
                debug!(machine_id = %machine_id, "Controller gone, releasing late claim");
                ledger.release(&claims, &machine_id, &user, generation).await;
            }
        });
    }

    fn on_claim_resolved(
        &mut self,
        generation: u64,
        machine_id: MachineId,
        user: UserId,
        result: AppResult<ClaimOutcome>,
    ) {
        if !self.is_current(generation, Phase::Connecting) {
            if let Ok(ClaimOutcome::Claimed { .. }) = result {
                info!(machine_id = %machine_id, "Claim landed after connect was abandoned, releasing");
                self.spawn_release(machine_id, user, generation);
            }
            return;
        }
        match result {
            Ok(ClaimOutcome::Claimed { record, reclaimed }) => {
                self.enter_connected(record, reclaimed, None)
            }
            Ok(ClaimOutcome::Degraded { record, warning }) => {
                self.enter_connected(record, false, Some(warning))
            }
            Err(e) => self.fail(Some(machine_id), e),
        }
    }

    fn fail(&mut self, machine_id: Option<MachineId>, error: AppError) {
        let reason = FailureReason::from_kind(error.kind);
        self.stop_scanner();
        self.state.phase = Phase::Failed(reason);
        self.state.last_error = Some(error.clone());
        self.publish();
        info!(machine_id = ?machine_id, %reason, error = %error, "Connect failed");
        self.emit(SessionEvent::ConnectFailed {
            machine_id,
            kind: error.kind,
            message: error.message,
        });

        self.generation += 1;
        self.state.reset();
        self.publish();
    }

    // ── Connected ───────────────────────────────────────────

    fn enter_connected(&mut self, record: MachineRecord, reclaimed: bool, warning: Option<AppError>) {
        let Some(user) = self.user.clone() else {
            return;
        };
        let machine_id = record.id.clone();
        let degraded = warning.is_some();

        self.state.phase = Phase::Connected;
        self.state.machine_id = Some(machine_id.clone());
        self.state.machine = Some(MachineSnapshot::from(&record));
        self.state.seconds_remaining = self.settings.session_length;
        self.state.degraded = degraded;
        self.state.last_error = warning;
        self.refresh_in_flight = false;

        self.arm_countdown();
        let generation = self.generation;
        self.refresher = Some(ScheduledTask::every(
            self.settings.refresh_interval,
            self.tx.clone(),
            move || Message::RefreshTick { generation },
        ));
        if self.settings.live_updates {
            self.subscribe(machine_id.clone());
        }

        self.publish();
        info!(machine_id = %machine_id, user_id = %user, degraded, reclaimed, "Connected");
        self.emit(SessionEvent::Connected {
            machine_id,
            user_id: user,
            degraded,
            reclaimed,
        });
    }

    /// (Re)start the countdown so its next tick is one full period away.
    fn arm_countdown(&mut self) {
        self.countdown_epoch += 1;
        let (generation, epoch) = (self.generation, self.countdown_epoch);
        self.countdown = Some(ScheduledTask::every(
            self.settings.countdown_tick,
            self.tx.clone(),
            move || Message::CountdownTick { generation, epoch },
        ));
    }

    fn subscribe(&mut self, machine_id: MachineId) {
        let generation = self.generation;
        let store = Arc::clone(&self.deps.store);
        let tx = self.tx.clone();
        self.subscription = Some(ScheduledTask::spawn(move |_| async move {
            let mut updates = match store.watch(machine::COLLECTION, machine_id.as_str()).await {
                Ok(updates) => updates,
                Err(e) => {
                    warn!(machine_id = %machine_id, error = %e, "Live updates unavailable, relying on refresher");
                    return;
                }
            };
            while let Some(result) = updates.recv().await {
                if tx.send(Message::Snapshot { generation, result }).is_err() {
                    break;
                }
            }
            debug!(machine_id = %machine_id, "Live updates ended");
        }));
    }

    fn stop_timers(&mut self) {
        self.countdown = None;
        self.refresher = None;
        self.subscription = None;
        self.refresh_in_flight = false;
    }

    fn on_countdown_tick(&mut self, generation: u64, epoch: u64) {
        if !self.is_current(generation, Phase::Connected) || epoch != self.countdown_epoch {
            return;
        }
        self.state.seconds_remaining = self.state.seconds_remaining.saturating_sub(1);
        if self.state.seconds_remaining == 0 {
            info!(machine_id = ?self.state.machine_id, "Session expired");
            self.end_session(DisconnectReason::Expired, None, true);
        } else {
            self.publish();
        }
    }

    fn on_refresh_tick(&mut self, generation: u64) {
        if !self.is_current(generation, Phase::Connected) {
            return;
        }
        if self.refresh_in_flight {
            debug!("Previous refresh still running, skipping tick");
            return;
        }
        let (Some(machine_id), Some(user)) = (self.state.machine_id.clone(), self.user.clone())
        else {
            return;
        };
        self.refresh_in_flight = true;
        let observe_only = self.state.degraded;
        let claims = self.claims.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = claims.refresh(&machine_id, &user, observe_only).await;
            let _ = tx.send(Message::RefreshResolved {
                generation,
                outcome,
            });
        });
    }

    fn on_refresh_resolved(&mut self, generation: u64, outcome: RefreshOutcome) {
        if !self.is_current(generation, Phase::Connected) {
            return;
        }
        self.refresh_in_flight = false;
        let Some(machine_id) = self.state.machine_id.clone() else {
            return;
        };

        match outcome {
            RefreshOutcome::Renewed(record) => {
                self.state.machine = Some(MachineSnapshot::from(&record));
                self.state.seconds_remaining = self.settings.session_length;
                self.state.last_error = None;
                self.arm_countdown();
                self.publish();
                debug!(machine_id = %machine_id, "Session refreshed");
                self.emit(SessionEvent::Refreshed { machine_id });
            }
            RefreshOutcome::Observed(record) => {
                self.state.machine = Some(MachineSnapshot::from(&record));
                self.publish();
            }
            RefreshOutcome::WriteFailed { record, error } => {
                self.state.machine = Some(MachineSnapshot::from(&record));
                self.publish();
                warn!(machine_id = %machine_id, error = %error, "Heartbeat write failed, keeping session");
                self.emit(SessionEvent::RefreshFailed {
                    machine_id,
                    kind: error.kind,
                    message: error.message,
                });
            }
            RefreshOutcome::ReadFailed(error) => {
                warn!(machine_id = %machine_id, error = %error, "Heartbeat read failed, keeping session");
                self.emit(SessionEvent::RefreshFailed {
                    machine_id,
                    kind: error.kind,
                    message: error.message,
                });
            }
            RefreshOutcome::Ended(check) => self.on_ownership_ended(check),
        }
    }

    fn on_snapshot(&mut self, generation: u64, result: AppResult<Option<Document>>) {
        if !self.is_current(generation, Phase::Connected) {
            return;
        }
        let Some(user) = self.user.clone() else {
            return;
        };
        let record = match result.and_then(|doc| decode_snapshot(doc.as_ref())) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Live update failed");
                return;
            }
        };
        match OwnershipCheck::assess(record, &user, self.state.degraded) {
            OwnershipCheck::Held(record) => {
                let snapshot = MachineSnapshot::from(&record);
                if self.state.machine.as_ref() != Some(&snapshot) {
                    self.state.machine = Some(snapshot);
                    self.publish();
                }
            }
            ended => self.on_ownership_ended(ended),
        }
    }

    fn on_ownership_ended(&mut self, check: OwnershipCheck) {
        let Some(machine_id) = self.state.machine_id.clone() else {
            return;
        };
        let error = check.error(&machine_id);
        let reason = match check {
            OwnershipCheck::Held(_) => return,
            OwnershipCheck::Lost { holder } => DisconnectReason::OwnershipLost { holder },
            OwnershipCheck::Deleted => DisconnectReason::MachineDeleted,
        };
        warn!(machine_id = %machine_id, ?reason, "Session lost");
        self.end_session(reason, error, false);
    }

    // ── Leaving Connected ───────────────────────────────────

    fn end_session(&mut self, reason: DisconnectReason, error: Option<AppError>, release: bool) {
        self.stop_timers();
        self.state.phase = Phase::Disconnecting;
        self.publish();

        if let Some(machine_id) = self.state.machine_id.clone() {
            if release {
                if let Some(user) = self.user.clone() {
                    self.spawn_release(machine_id.clone(), user, self.generation);
                }
            }
            info!(machine_id = %machine_id, ?reason, "Disconnected");
            self.emit(SessionEvent::Disconnected { machine_id, reason });
        }

        self.generation += 1;
        self.state.reset();
        self.state.last_error = error;
        self.publish();
    }

    /// Fire-and-forget release of the claim made by attempt `generation`;
    /// the outcome is reported as an event.
    fn spawn_release(&self, machine_id: MachineId, user: UserId, generation: u64) {
        let claims = self.claims.clone();
        let ledger = self.ledger.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let outcome = ledger
                .release(&claims, &machine_id, &user, generation)
                .await;
            let _ = events.send(SessionEvent::Released {
                machine_id,
                outcome,
            });
        });
    }
}
