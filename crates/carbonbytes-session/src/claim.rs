//! Claim, heartbeat and release against the shared machine documents.
//!
//! The store offers no mutual exclusion, so every decision here is made
//! from a fresh read: a machine held by a *different* user is never
//! written to, a machine held by the caller is reclaimed idempotently, and
//! release only clears a claim the read shows the caller still holds.

use std::sync::Arc;

use tracing::{debug, info, warn};

use carbonbytes_core::error::{AppError, ErrorKind};
use carbonbytes_core::events::ReleaseStatus;
use carbonbytes_core::result::AppResult;
use carbonbytes_core::traits::DocumentStore;
use carbonbytes_core::types::{Document, MachineId, UserId, WriteMode};
use carbonbytes_entity::machine::{COLLECTION, MachineRecord, MachineStatus, Ownership};

/// Result of a successful connect.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// The claim write was accepted.
    Claimed {
        /// Machine as it stands after the claim.
        record: MachineRecord,
        /// The caller already held the machine.
        reclaimed: bool,
    },
    /// The read succeeded but the claim write was denied. The session runs
    /// locally without server coordination.
    Degraded {
        /// Machine as read before the denied write.
        record: MachineRecord,
        /// Warning to surface to the user.
        warning: AppError,
    },
}

impl ClaimOutcome {
    /// The machine record.
    pub fn record(&self) -> &MachineRecord {
        match self {
            Self::Claimed { record, .. } | Self::Degraded { record, .. } => record,
        }
    }

    /// Whether the claim write was denied.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// What a read says about a session's hold on its machine.
#[derive(Debug, Clone, PartialEq)]
pub enum OwnershipCheck {
    /// The session may continue.
    Held(MachineRecord),
    /// Someone else holds the machine, or nobody does.
    Lost {
        /// Holder observed by the read.
        holder: Option<UserId>,
    },
    /// The machine record is gone.
    Deleted,
}

impl OwnershipCheck {
    /// Judge a read of the session's machine.
    ///
    /// A degraded session never managed to write its claim, so an
    /// unclaimed machine is expected and only a different holder counts.
    pub fn assess(record: Option<MachineRecord>, user: &UserId, degraded: bool) -> Self {
        let Some(record) = record else {
            return Self::Deleted;
        };
        match record.ownership(user) {
            Ownership::Mine => Self::Held(record),
            Ownership::Unclaimed if degraded => Self::Held(record),
            Ownership::Unclaimed => Self::Lost { holder: None },
            Ownership::Other(holder) => Self::Lost {
                holder: Some(holder),
            },
        }
    }

    /// Error describing a lost session, if this check ends it.
    pub fn error(&self, machine: &MachineId) -> Option<AppError> {
        match self {
            Self::Held(_) => None,
            Self::Lost { holder: Some(_) } => Some(AppError::stale_ownership(format!(
                "Machine '{machine}' is now in use by another user"
            ))),
            Self::Lost { holder: None } => Some(AppError::stale_ownership(format!(
                "Your session on machine '{machine}' was ended elsewhere"
            ))),
            Self::Deleted => Some(AppError::not_found(format!(
                "Machine '{machine}' no longer exists"
            ))),
        }
    }
}

/// Outcome of one activity-refresher tick.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// Ownership confirmed and `lastActive` written.
    Renewed(MachineRecord),
    /// Ownership confirmed; nothing written (degraded session).
    Observed(MachineRecord),
    /// Ownership confirmed but the heartbeat write failed.
    WriteFailed {
        /// Machine as read.
        record: MachineRecord,
        /// Why the write failed.
        error: AppError,
    },
    /// The read failed; ownership is unknown.
    ReadFailed(AppError),
    /// The read shows the session is over.
    Ended(OwnershipCheck),
}

/// Claim protocol over a [`DocumentStore`].
#[derive(Debug, Clone)]
pub struct ClaimProtocol {
    store: Arc<dyn DocumentStore>,
}

impl ClaimProtocol {
    /// Create the protocol over a store.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Read a machine record.
    pub async fn read(&self, machine: &MachineId) -> AppResult<Option<MachineRecord>> {
        self.store
            .get(COLLECTION, machine.as_str())
            .await?
            .as_ref()
            .map(MachineRecord::from_document)
            .transpose()
    }

    /// Claim `machine` for `user`.
    ///
    /// Fails with `NotFound` if the machine has no record, `Conflict` if a
    /// different user holds it (nothing is written), and `Transient` on any
    /// other store failure. A denied claim write yields
    /// [`ClaimOutcome::Degraded`].
    pub async fn claim(&self, machine: &MachineId, user: &UserId) -> AppResult<ClaimOutcome> {
        let record = match self.read(machine).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                return Err(AppError::not_found(format!(
                    "Machine '{machine}' was not found"
                )));
            }
            Err(e) if e.is(ErrorKind::PermissionDenied) => {
                return Err(AppError::permission_denied(format!(
                    "You are not allowed to use machine '{machine}'"
                )));
            }
            Err(e) => return Err(retryable(machine, e)),
        };

        let reclaimed = match record.ownership(user) {
            Ownership::Other(_) => {
                debug!(machine_id = %machine, user_id = %user, "Machine held by another user");
                return Err(AppError::conflict(format!(
                    "Machine '{machine}' is in use by another user"
                )));
            }
            Ownership::Mine => true,
            Ownership::Unclaimed => false,
        };

        let write = self
            .store
            .set(
                COLLECTION,
                machine.as_str(),
                MachineRecord::claim_patch(user),
                WriteMode::Update,
            )
            .await;

        match write {
            Ok(()) => {
                info!(machine_id = %machine, user_id = %user, reclaimed, "Machine claimed");
                let mut record = record;
                record.current_session = Some(user.clone());
                record.status = MachineStatus::Active;
                Ok(ClaimOutcome::Claimed { record, reclaimed })
            }
            Err(e) if e.is(ErrorKind::PermissionDenied) => {
                warn!(machine_id = %machine, user_id = %user, error = %e, "Claim write denied, continuing locally");
                Ok(ClaimOutcome::Degraded {
                    record,
                    warning: AppError::permission_denied(format!(
                        "Connected to '{machine}' without a server-side claim; the session cannot be extended"
                    )),
                })
            }
            Err(e) if e.is(ErrorKind::NotFound) => Err(AppError::not_found(format!(
                "Machine '{machine}' was not found"
            ))),
            Err(e) => Err(retryable(machine, e)),
        }
    }

    /// One activity-refresher pass: re-read, then renew unless observing.
    pub async fn refresh(
        &self,
        machine: &MachineId,
        user: &UserId,
        observe_only: bool,
    ) -> RefreshOutcome {
        let record = match self.read(machine).await {
            Ok(record) => record,
            Err(e) => return RefreshOutcome::ReadFailed(e),
        };
        let record = match OwnershipCheck::assess(record, user, observe_only) {
            OwnershipCheck::Held(record) => record,
            ended => return RefreshOutcome::Ended(ended),
        };
        if observe_only {
            return RefreshOutcome::Observed(record);
        }

        match self
            .store
            .set(
                COLLECTION,
                machine.as_str(),
                MachineRecord::heartbeat_patch(),
                WriteMode::Update,
            )
            .await
        {
            Ok(()) => RefreshOutcome::Renewed(record),
            Err(error) => RefreshOutcome::WriteFailed { record, error },
        }
    }

    /// Best-effort release. Never fails; the outcome is logged and returned.
    pub async fn release(&self, machine: &MachineId, user: &UserId) -> ReleaseStatus {
        let record = match self.read(machine).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(machine_id = %machine, "Release skipped, machine missing");
                return ReleaseStatus::Missing;
            }
            Err(e) => {
                warn!(machine_id = %machine, error = %e, "Release read failed");
                return ReleaseStatus::Failed { message: e.message };
            }
        };
        if !record.is_held_by(user) {
            debug!(machine_id = %machine, user_id = %user, "Release skipped, claim not held");
            return ReleaseStatus::NotHeld;
        }

        match self
            .store
            .set(
                COLLECTION,
                machine.as_str(),
                MachineRecord::release_patch(),
                WriteMode::Update,
            )
            .await
        {
            Ok(()) => {
                info!(machine_id = %machine, user_id = %user, "Machine released");
                ReleaseStatus::Released
            }
            Err(e) => {
                warn!(machine_id = %machine, error = %e, "Release write failed");
                ReleaseStatus::Failed { message: e.message }
            }
        }
    }
}

/// Decode an optional machine document, as delivered by a subscription.
pub fn decode_snapshot(doc: Option<&Document>) -> AppResult<Option<MachineRecord>> {
    doc.map(MachineRecord::from_document).transpose()
}

fn retryable(machine: &MachineId, err: AppError) -> AppError {
    let message = format!("Could not reach machine '{machine}', try again ({})", err.message);
    AppError::with_source(ErrorKind::Transient, message, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use carbonbytes_store::MemoryDocumentStore;
    use serde_json::json;

    fn setup(holder: Option<&str>) -> (MemoryDocumentStore, ClaimProtocol) {
        let store = MemoryDocumentStore::default();
        store
            .seed(&json!({"machines": {"M1": {"currentSession": holder, "status": "idle", "name": "Lobby"}}}))
            .unwrap();
        let protocol = ClaimProtocol::new(Arc::new(store.clone()));
        (store, protocol)
    }

    fn ids() -> (MachineId, UserId, UserId) {
        (
            MachineId::parse("M1").unwrap(),
            UserId::parse("U1").unwrap(),
            UserId::parse("U2").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_claim_unclaimed() {
        let (store, protocol) = setup(None);
        let (m, u1, _) = ids();
        let outcome = protocol.claim(&m, &u1).await.unwrap();
        assert!(matches!(outcome, ClaimOutcome::Claimed { reclaimed: false, .. }));
        let doc = store.raw("machines", "M1").unwrap();
        assert_eq!(doc["currentSession"], json!("U1"));
        assert_eq!(doc["status"], json!("active"));
        assert!(doc["lastActive"].is_string());
    }

    #[tokio::test]
    async fn test_claim_missing_is_not_found() {
        let (store, protocol) = setup(None);
        let (_, u1, _) = ids();
        let err = protocol
            .claim(&MachineId::parse("M404").unwrap(), &u1)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_conflict_writes_nothing() {
        let (store, protocol) = setup(Some("U2"));
        let (m, u1, _) = ids();
        let err = protocol.claim(&m, &u1).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_self_reclaim() {
        let (_, protocol) = setup(Some("U1"));
        let (m, u1, _) = ids();
        let outcome = protocol.claim(&m, &u1).await.unwrap();
        assert!(matches!(outcome, ClaimOutcome::Claimed { reclaimed: true, .. }));
    }

    #[tokio::test]
    async fn test_denied_write_degrades() {
        let (store, protocol) = setup(None);
        store.deny_writes("machines", Some("M1"));
        let (m, u1, _) = ids();
        let outcome = protocol.claim(&m, &u1).await.unwrap();
        assert!(outcome.is_degraded());
        assert!(outcome.record().current_session.is_none());
    }

    #[tokio::test]
    async fn test_transient_write_is_retryable_failure() {
        let (store, protocol) = setup(None);
        store.fail_next_writes(1);
        let (m, u1, _) = ids();
        let err = protocol.claim(&m, &u1).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_refresh_detects_takeover() {
        let (_, protocol) = setup(Some("U2"));
        let (m, u1, u2) = ids();
        let outcome = protocol.refresh(&m, &u1, false).await;
        assert_eq!(
            outcome,
            RefreshOutcome::Ended(OwnershipCheck::Lost { holder: Some(u2) })
        );
    }

    #[tokio::test]
    async fn test_observe_only_tolerates_unclaimed() {
        let (store, protocol) = setup(None);
        let (m, u1, _) = ids();
        assert!(matches!(
            protocol.refresh(&m, &u1, true).await,
            RefreshOutcome::Observed(_)
        ));
        assert_eq!(store.write_count(), 0);
        assert_eq!(
            protocol.refresh(&m, &u1, false).await,
            RefreshOutcome::Ended(OwnershipCheck::Lost { holder: None })
        );
    }

    #[tokio::test]
    async fn test_release_only_when_held() {
        let (store, protocol) = setup(Some("U2"));
        let (m, u1, u2) = ids();
        assert_eq!(protocol.release(&m, &u1).await, ReleaseStatus::NotHeld);
        assert_eq!(store.write_count(), 0);

        assert_eq!(protocol.release(&m, &u2).await, ReleaseStatus::Released);
        let doc = store.raw("machines", "M1").unwrap();
        assert_eq!(doc["currentSession"], serde_json::Value::Null);
        assert_eq!(doc["status"], json!("idle"));
    }

    #[tokio::test]
    async fn test_release_swallows_failures() {
        let (store, protocol) = setup(Some("U1"));
        let (m, u1, _) = ids();
        store.fail_next_writes(1);
        assert!(matches!(
            protocol.release(&m, &u1).await,
            ReleaseStatus::Failed { .. }
        ));
        store.delete("machines", "M1");
        assert_eq!(protocol.release(&m, &u1).await, ReleaseStatus::Missing);
    }
}
