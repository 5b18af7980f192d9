use super::{CredentialPair, CredentialStore, StoreError};

pub const KEYRING_SERVICE: &str = "com.clm.session";
pub const KEYRING_USER_ACCESS_TOKEN: &str = "access_token";
pub const KEYRING_USER_REFRESH_TOKEN: &str = "refresh_token";

/// OS keychain / secret service backed store.
///
/// Each token lives in its own entry. `save` writes the access token first and rolls
/// it back if the refresh token cannot be written.
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service: String,
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new(KEYRING_SERVICE)
    }
}

fn map_keyring_error(err: keyring::Error) -> StoreError {
    match err {
        keyring::Error::NoStorageAccess(_) | keyring::Error::PlatformFailure(_) => {
            StoreError::Unavailable
        }
        other => StoreError::Backend(other.to_string()),
    }
}

impl KeyringCredentialStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, user: &str) -> Result<keyring::Entry, keyring::Error> {
        keyring::Entry::new(&self.service, user)
    }

    pub fn is_available(&self) -> bool {
        let Ok(entry) = self.entry(KEYRING_USER_ACCESS_TOKEN) else {
            return false;
        };

        match entry.get_password() {
            Ok(_) => true,
            Err(keyring::Error::NoEntry) => true,
            Err(keyring::Error::BadEncoding(_)) => true,
            Err(keyring::Error::Ambiguous(_)) => true,
            Err(_) => false,
        }
    }

    fn read(&self, user: &str) -> Result<Option<String>, StoreError> {
        let entry = self.entry(user).map_err(map_keyring_error)?;
        match entry.get_password() {
            Ok(value) => {
                let trimmed = value.trim();
                Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(map_keyring_error(err)),
        }
    }

    fn write(&self, user: &str, value: &str) -> Result<(), StoreError> {
        let entry = self.entry(user).map_err(map_keyring_error)?;
        entry.set_password(value).map_err(map_keyring_error)
    }

    fn delete(&self, user: &str) -> Result<(), StoreError> {
        let entry = self.entry(user).map_err(map_keyring_error)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(map_keyring_error(err)),
        }
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn load(&self) -> Result<Option<CredentialPair>, StoreError> {
        let Some(access_token) = self.read(KEYRING_USER_ACCESS_TOKEN)? else {
            return Ok(None);
        };
        let Some(refresh_token) = self.read(KEYRING_USER_REFRESH_TOKEN)? else {
            return Ok(None);
        };
        Ok(Some(CredentialPair {
            access_token,
            refresh_token,
        }))
    }

    fn save(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        let pair = pair
            .clone()
            .normalized()
            .ok_or_else(|| StoreError::Backend("refusing to store an empty token".to_string()))?;

        let previous_access = self.read(KEYRING_USER_ACCESS_TOKEN)?;
        self.write(KEYRING_USER_ACCESS_TOKEN, &pair.access_token)?;

        if let Err(err) = self.write(KEYRING_USER_REFRESH_TOKEN, &pair.refresh_token) {
            let rollback = match previous_access {
                Some(previous) => self.write(KEYRING_USER_ACCESS_TOKEN, &previous),
                None => self.delete(KEYRING_USER_ACCESS_TOKEN),
            };
            if let Err(rollback_err) = rollback {
                tracing::warn!(error = %rollback_err, "failed to roll back access token");
            }
            return Err(err);
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let access = self.delete(KEYRING_USER_ACCESS_TOKEN);
        let refresh = self.delete(KEYRING_USER_REFRESH_TOKEN);
        access.and(refresh)
    }
}
