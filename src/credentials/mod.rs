//! Credential persistence.
//!
//! The session client never caches tokens itself: it reloads them from a
//! [`CredentialStore`] before every request, so a token refreshed by another client
//! instance sharing the same store is picked up immediately.

mod memory;
mod secret_store;

pub use memory::MemoryCredentialStore;
pub use secret_store::{KeyringCredentialStore, KEYRING_SERVICE, KEYRING_USER_ACCESS_TOKEN, KEYRING_USER_REFRESH_TOKEN};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Trims both tokens; `None` when either ends up empty.
    pub fn normalized(self) -> Option<Self> {
        let access_token = self.access_token.trim().to_string();
        let refresh_token = self.refresh_token.trim().to_string();
        if access_token.is_empty() || refresh_token.is_empty() {
            None
        } else {
            Some(Self {
                access_token,
                refresh_token,
            })
        }
    }
}

impl std::fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("credential storage is unavailable")]
    Unavailable,
    #[error("credential storage failed: {0}")]
    Backend(String),
}

/// Shared, process-wide token storage.
///
/// `save` replaces the whole pair and `clear` removes both tokens; implementations must
/// never leave one token updated and the other stale.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<CredentialPair>, StoreError>;
    fn save(&self, pair: &CredentialPair) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}
