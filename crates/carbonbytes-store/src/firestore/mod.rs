//! Firestore REST provider.
//!
//! Reads use `GET` on document paths, writes go through `documents:commit`
//! (so server timestamps and the "document must exist" precondition are
//! honored), and queries use `documents:runQuery`. The REST API has no push
//! channel, so subscriptions poll.

pub mod client;
pub mod query;
pub mod value;

pub use client::FirestoreDocumentStore;
