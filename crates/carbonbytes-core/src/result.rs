//! Convenience result type alias for Carbon Bytes.

use crate::error::AppError;

/// A specialized `Result` type for Carbon Bytes operations.
pub type AppResult<T> = Result<T, AppError>;
