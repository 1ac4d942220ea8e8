//! In-process document store.

pub mod query;
pub mod store;

pub use store::{MemoryDocumentStore, WriteRecord};
