//! Points transactions, appended by the process that awards points.

pub mod model;
pub mod waste;

pub use model::Transaction;
pub use waste::WasteType;

/// Collection holding transaction documents.
pub const COLLECTION: &str = "transactions";

/// Stored field names.
pub mod fields {
    /// Owner of the transaction.
    pub const USER_ID: &str = "userId";
    /// Machine the item was deposited in.
    pub const MACHINE_ID: &str = "machineId";
    /// Waste category.
    pub const WASTE_TYPE: &str = "wasteType";
    /// Points awarded.
    pub const POINTS: &str = "points";
    /// Award time.
    pub const TIMESTAMP: &str = "timestamp";
}
