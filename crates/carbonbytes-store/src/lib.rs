//! # carbonbytes-store
//!
//! Document store providers for the Carbon Bytes client.
//!
//! - `memory` — an in-process store with push subscriptions, access rules
//!   and fault injection; used for local runs and as the fake in tests.
//! - `firestore` — the hosted document database over its REST API.
//!
//! [`provider::StoreManager`] selects one of them from configuration.

pub mod collections;
#[cfg(feature = "firestore")]
pub mod firestore;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;

#[cfg(feature = "memory")]
pub use memory::MemoryDocumentStore;
pub use provider::StoreManager;
