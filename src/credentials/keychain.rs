//! OS keychain backend (macOS Keychain, Windows Credential Manager, Linux kernel
//! keyutils). The whole credential document is one keychain entry.

use super::{
    CredentialError,
    storage::{SecureStorage, StoredCredentials},
};
use async_trait::async_trait;
use keyring::Entry;

pub struct KeyringStorage {
    entry: Entry,
}

impl KeyringStorage {
    /// # Errors
    /// Returns an error if the platform keychain rejects the service/user pair.
    pub fn new(service: &str, user: &str) -> Result<Self, CredentialError> {
        let entry = Entry::new(service, user).map_err(backend_error)?;
        Ok(Self { entry })
    }
}

fn backend_error(err: keyring::Error) -> CredentialError {
    CredentialError::Backend(err.to_string())
}

#[async_trait]
impl SecureStorage for KeyringStorage {
    async fn load(&self) -> Result<StoredCredentials, CredentialError> {
        match self.entry.get_password() {
            Ok(document) => Ok(serde_json::from_str(&document)?),
            Err(keyring::Error::NoEntry) => Ok(StoredCredentials::default()),
            Err(err) => Err(backend_error(err)),
        }
    }

    async fn store(&self, credentials: &StoredCredentials) -> Result<(), CredentialError> {
        if credentials.is_empty() {
            return self.wipe().await;
        }
        let document = serde_json::to_string(credentials)?;
        self.entry.set_password(&document).map_err(backend_error)
    }

    async fn wipe(&self) -> Result<(), CredentialError> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(backend_error(err)),
        }
    }
}
