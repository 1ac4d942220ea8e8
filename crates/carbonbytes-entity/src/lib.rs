//! # carbonbytes-entity
//!
//! Document models for the Carbon Bytes client. Every struct in this crate
//! mirrors a document in one of the shared store's collections and knows
//! how to decode itself from a [`carbonbytes_core::types::Document`] and
//! which [`carbonbytes_core::types::Patch`]es the client writes back.

pub mod machine;
pub mod transaction;
pub mod user;
