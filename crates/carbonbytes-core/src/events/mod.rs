//! Domain events.

pub mod session;

pub use session::{DisconnectReason, ReleaseStatus, SessionEvent};
