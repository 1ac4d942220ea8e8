//! User profile model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use carbonbytes_core::error::AppError;
use carbonbytes_core::types::{Document, Patch, UserId};

use super::fields;

/// A user document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// User id (document key).
    pub id: UserId,
    /// Display name.
    pub display_name: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Avatar URL.
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    /// Points balance, maintained by the awarding process.
    pub points: i64,
    /// When the profile was created.
    pub created_at: Option<DateTime<Utc>>,
    /// Last sign-in.
    pub last_active: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredUser {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default, rename = "photoURL")]
    photo_url: Option<String>,
    #[serde(default)]
    points: Option<i64>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    last_active: Option<DateTime<Utc>>,
}

/// Identity details supplied by the authentication provider at sign-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    /// User id.
    pub id: UserId,
    /// Display name.
    pub display_name: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Avatar URL.
    pub photo_url: Option<String>,
}

impl UserProfile {
    /// Decode a profile from a `users` document. Missing points count as 0.
    pub fn from_document(doc: &Document) -> Result<Self, AppError> {
        let id = UserId::parse(&doc.id)?;
        let stored: StoredUser = doc.decode()?;
        Ok(Self {
            id,
            display_name: stored.display_name,
            email: stored.email,
            photo_url: stored.photo_url,
            points: stored.points.unwrap_or(0),
            created_at: stored.created_at,
            last_active: stored.last_active,
        })
    }

    /// Label for display, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(self.id.as_str())
    }

    /// Patch creating a profile with a zero balance.
    pub fn creation_patch(user: &NewUser) -> Patch {
        let optional = |value: &Option<String>| {
            value
                .as_deref()
                .map_or(serde_json::Value::Null, serde_json::Value::from)
        };
        Patch::new()
            .set(fields::DISPLAY_NAME, optional(&user.display_name))
            .set(fields::EMAIL, optional(&user.email))
            .set(fields::PHOTO_URL, optional(&user.photo_url))
            .set(fields::POINTS, 0)
            .server_timestamp(fields::CREATED_AT)
            .server_timestamp(fields::LAST_ACTIVE)
    }

    /// Patch recording a sign-in on an existing profile.
    pub fn touch_patch() -> Patch {
        Patch::new().server_timestamp(fields::LAST_ACTIVE)
    }
}
