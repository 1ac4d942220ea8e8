//! Shared value types.

pub mod document;
pub mod id;

pub use document::{Direction, Document, Fields, Filter, FilterOp, OrderBy, Patch, Query, WriteMode};
pub use id::{MachineId, TransactionId, UserId};
