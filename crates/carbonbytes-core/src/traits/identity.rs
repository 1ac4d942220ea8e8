//! Current-user identity, injected into the session controller.

use std::sync::{Arc, RwLock};

use crate::types::id::UserId;

/// Supplies the currently signed-in user, if any.
pub trait IdentityProvider: Send + Sync + std::fmt::Debug + 'static {
    /// The signed-in user, or `None` when nobody is authenticated.
    fn current_user(&self) -> Option<UserId>;
}

/// Identity holder updated by whatever performs authentication.
#[derive(Debug, Clone, Default)]
pub struct SharedIdentity {
    user: Arc<RwLock<Option<UserId>>>,
}

impl SharedIdentity {
    /// Create an identity with nobody signed in.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Create an identity with `user` signed in.
    pub fn signed_in(user: UserId) -> Self {
        Self {
            user: Arc::new(RwLock::new(Some(user))),
        }
    }

    /// Record a sign-in.
    pub fn sign_in(&self, user: UserId) {
        if let Ok(mut guard) = self.user.write() {
            *guard = Some(user);
        }
    }

    /// Record a sign-out.
    pub fn sign_out(&self) {
        if let Ok(mut guard) = self.user.write() {
            *guard = None;
        }
    }
}

impl IdentityProvider for SharedIdentity {
    fn current_user(&self) -> Option<UserId> {
        self.user.read().ok().and_then(|guard| guard.clone())
    }
}
