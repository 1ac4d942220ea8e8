//! Newtype wrappers around opaque string keys for all document identifiers.
//!
//! Machine ids are whatever is printed in the QR code and user ids come from
//! the identity provider, so neither is guaranteed to be a UUID. Distinct
//! types still prevent passing a `UserId` where a `MachineId` is expected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Longest key accepted by [`validate_key`], in bytes.
pub const MAX_KEY_LEN: usize = 1500;

/// Macro to define a newtype key wrapper around `String`.
macro_rules! define_key {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Parse a key, trimming surrounding whitespace.
            pub fn parse(raw: &str) -> Result<Self, AppError> {
                validate_key(raw.trim()).map(|k| Self(k.to_string()))
            }

            /// Return the key as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Return the inner string.
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

define_key!(
    /// Identifier of a physical machine (the QR payload).
    MachineId
);

define_key!(
    /// Identifier of an authenticated user.
    UserId
);

define_key!(
    /// Identifier of a points transaction.
    TransactionId
);

/// Check that `key` can address a single document.
///
/// Keys must be non-empty, must not contain `/` (which would address a
/// nested path), must not be `.` or `..`, and must fit in [`MAX_KEY_LEN`].
pub fn validate_key(key: &str) -> Result<&str, AppError> {
    if key.is_empty() {
        return Err(AppError::validation("Identifier must not be empty"));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(AppError::validation(format!(
            "Identifier exceeds {MAX_KEY_LEN} bytes"
        )));
    }
    if key.contains('/') || key == "." || key == ".." {
        return Err(AppError::validation(format!(
            "Identifier '{key}' is not a valid document key"
        )));
    }
    Ok(key)
}
