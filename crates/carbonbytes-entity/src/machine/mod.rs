//! Machine (smart bin) documents.

pub mod model;
pub mod status;

pub use model::{MachineRecord, Ownership};
pub use status::MachineStatus;

/// Collection holding machine documents, keyed by machine id.
pub const COLLECTION: &str = "machines";

/// Stored field names.
pub mod fields {
    /// Holder of the claim.
    pub const CURRENT_SESSION: &str = "currentSession";
    /// Redundant idle/active flag.
    pub const STATUS: &str = "status";
    /// Server time of the last claim or heartbeat.
    pub const LAST_ACTIVE: &str = "lastActive";
    /// Display label.
    pub const NAME: &str = "name";
}
