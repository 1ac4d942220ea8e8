//! Core traits defined in `carbonbytes-core` and implemented by other crates.

pub mod code_source;
pub mod document_store;
pub mod identity;

pub use code_source::{CodeSource, ScanCallback, ScanEvent, ScanHandle, ScanOptions, ScanRegion};
pub use document_store::{DocumentStore, Subscription, SubscriptionSender};
pub use identity::{IdentityProvider, SharedIdentity};
