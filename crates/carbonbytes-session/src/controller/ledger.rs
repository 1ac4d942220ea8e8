//! Per-machine ordering of one controller's claim and release writes.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;

use carbonbytes_core::events::ReleaseStatus;
use carbonbytes_core::result::AppResult;
use carbonbytes_core::types::{MachineId, UserId};

use crate::claim::{ClaimOutcome, ClaimProtocol};

/// Runs this controller's claims and releases one at a time per machine
/// and remembers which attempt last landed a claim on each.
///
/// A release only clears the claim of the attempt that made it. Once a
/// newer attempt has claimed the same machine, older releases are skipped
/// instead of clearing the newer session's claim.
#[derive(Debug, Clone, Default)]
pub(crate) struct ClaimLedger {
    machines: Arc<DashMap<MachineId, Arc<Mutex<Option<u64>>>>>,
}

impl ClaimLedger {
    fn slot(&self, machine: &MachineId) -> Arc<Mutex<Option<u64>>> {
        Arc::clone(self.machines.entry(machine.clone()).or_default().value())
    }

    /// Claim `machine` for the attempt `generation`.
    pub(crate) async fn claim(
        &self,
        claims: &ClaimProtocol,
        machine: &MachineId,
        user: &UserId,
        generation: u64,
    ) -> AppResult<ClaimOutcome> {
        let slot = self.slot(machine);
        let mut owner = slot.lock().await;
        let result = claims.claim(machine, user).await;
        if let Ok(ClaimOutcome::Claimed { .. }) = result {
            *owner = Some(generation);
        }
        result
    }

    /// Release the claim made by the attempt `generation`, unless a later
    /// attempt has claimed the machine since. Without any landed claim on
    /// record the store's holder decides, as for a plain release.
    pub(crate) async fn release(
        &self,
        claims: &ClaimProtocol,
        machine: &MachineId,
        user: &UserId,
        generation: u64,
    ) -> ReleaseStatus {
        let slot = self.slot(machine);
        let owner = slot.lock().await;
        if (*owner).is_some_and(|current| current != generation) {
            debug!(machine_id = %machine, generation, owner = ?*owner, "Release skipped, claim superseded");
            return ReleaseStatus::Superseded;
        }
        claims.release(machine, user).await
    }
}
