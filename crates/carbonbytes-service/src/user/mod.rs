//! User profile services.

pub mod service;

pub use service::UserService;
