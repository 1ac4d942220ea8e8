//! # carbonbytes-core
//!
//! Core crate for the Carbon Bytes client. Contains the document store and
//! code source traits, configuration schemas, typed identifiers, session
//! events, and the unified error system.
//!
//! This crate has **no** internal dependencies on other Carbon Bytes crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
