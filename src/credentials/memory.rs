use super::{CredentialPair, CredentialStore, StoreError};
use parking_lot::RwLock;
use std::sync::Arc;

/// In-process store. Clones share the same slot, which is how several clients in one
/// process observe each other's refreshes.
#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    slot: Arc<RwLock<Option<CredentialPair>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(pair: CredentialPair) -> Self {
        Self {
            slot: Arc::new(RwLock::new(pair.normalized())),
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.slot.read().as_ref().map(|p| p.access_token.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.slot.read().as_ref().map(|p| p.refresh_token.clone())
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<CredentialPair>, StoreError> {
        Ok(self.slot.read().clone())
    }

    fn save(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        let pair = pair
            .clone()
            .normalized()
            .ok_or_else(|| StoreError::Backend("refusing to store an empty token".to_string()))?;
        *self.slot.write() = Some(pair);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.slot.write() = None;
        Ok(())
    }
}
