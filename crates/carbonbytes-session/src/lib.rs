//! # carbonbytes-session
//!
//! The machine session lifecycle: scanning a machine code, claiming the
//! machine in the shared store, keeping the claim alive with a countdown
//! and an activity refresher, and releasing it on disconnect, expiry or
//! unmount.
//!
//! The controller is a single task draining one event queue; see
//! [`controller::SessionController`].

pub mod claim;
pub mod controller;
pub mod scanner;
pub mod state;
pub mod timer;

pub use claim::{ClaimOutcome, ClaimProtocol, OwnershipCheck, RefreshOutcome};
pub use controller::{SessionController, SessionDeps, SessionSettings};
pub use scanner::{CodeFeeder, ManualCodeSource};
pub use state::{ClientSessionState, FailureReason, MachineSnapshot, Phase, SessionView, format_countdown};
pub use timer::ScheduledTask;
