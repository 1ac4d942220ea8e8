//! User profile documents.

pub mod model;

pub use model::{NewUser, UserProfile};

/// Collection holding user documents, keyed by user id.
pub const COLLECTION: &str = "users";

/// Stored field names.
pub mod fields {
    /// Display name.
    pub const DISPLAY_NAME: &str = "displayName";
    /// Email address.
    pub const EMAIL: &str = "email";
    /// Avatar URL.
    pub const PHOTO_URL: &str = "photoURL";
    /// Points balance.
    pub const POINTS: &str = "points";
    /// Creation time.
    pub const CREATED_AT: &str = "createdAt";
    /// Last sign-in time.
    pub const LAST_ACTIVE: &str = "lastActive";
}
