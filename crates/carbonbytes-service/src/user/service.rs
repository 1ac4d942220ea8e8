//! User profile bootstrap and lookup.

use std::sync::Arc;

use tracing::info;

use carbonbytes_core::error::AppError;
use carbonbytes_core::result::AppResult;
use carbonbytes_core::traits::DocumentStore;
use carbonbytes_core::types::{UserId, WriteMode};
use carbonbytes_entity::user::{self, NewUser, UserProfile};

/// Creates and reads `users` documents.
#[derive(Debug, Clone)]
pub struct UserService {
    store: Arc<dyn DocumentStore>,
}

impl UserService {
    /// Creates a new user service.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Record a sign-in.
    ///
    /// A first sign-in creates the profile with a zero balance; later
    /// sign-ins only refresh `lastActive`, so points are never reset.
    pub async fn sign_in(&self, new_user: &NewUser) -> AppResult<UserProfile> {
        let id = new_user.id.as_str();
        let existing = self.store.get(user::COLLECTION, id).await?;

        if existing.is_some() {
            self.store
                .set(user::COLLECTION, id, UserProfile::touch_patch(), WriteMode::Update)
                .await?;
        } else {
            self.store
                .set(
                    user::COLLECTION,
                    id,
                    UserProfile::creation_patch(new_user),
                    WriteMode::Replace,
                )
                .await?;
            info!(user_id = %new_user.id, "Created user profile");
        }

        self.profile(&new_user.id)
            .await?
            .ok_or_else(|| AppError::internal(format!("Profile for '{}' vanished after sign-in", new_user.id)))
    }

    /// Read a profile.
    pub async fn profile(&self, id: &UserId) -> AppResult<Option<UserProfile>> {
        self.store
            .get(user::COLLECTION, id.as_str())
            .await?
            .as_ref()
            .map(UserProfile::from_document)
            .transpose()
    }
}
