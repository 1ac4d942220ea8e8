//! Everything that can happen to a session, serialized onto one queue.

use carbonbytes_core::result::AppResult;
use carbonbytes_core::traits::{ScanEvent, ScanHandle};
use carbonbytes_core::types::{Document, MachineId, UserId};

use crate::claim::{ClaimOutcome, RefreshOutcome};

/// Inbox message of the controller task.
///
/// Anything that reports back from a spawned task carries the generation
/// it was issued for, so the controller can drop answers to questions it
/// is no longer asking.
#[derive(Debug)]
pub(crate) enum Message {
    StartScan,
    CancelScan,
    Disconnect,
    Unmount,
    ScanOpened {
        generation: u64,
        result: AppResult<ScanHandle>,
    },
    Scan {
        generation: u64,
        event: ScanEvent,
    },
    ClaimResolved {
        generation: u64,
        machine_id: MachineId,
        user: UserId,
        result: AppResult<ClaimOutcome>,
    },
    CountdownTick {
        generation: u64,
        epoch: u64,
    },
    RefreshTick {
        generation: u64,
    },
    RefreshResolved {
        generation: u64,
        outcome: RefreshOutcome,
    },
    Snapshot {
        generation: u64,
        result: AppResult<Option<Document>>,
    },
}
