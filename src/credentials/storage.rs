//! Storage backends for the credential document.
//!
//! A backend persists exactly one [`StoredCredentials`] document. Load, store and
//! wipe always operate on the whole document, so a backend never holds a token
//! pair that was only half written.

use super::CredentialError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Key/value entries persisted by every backend. The field names are the stable
/// storage keys and must not be renamed.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl StoredCredentials {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.username.is_none()
    }

    /// Drops a half pair; both tokens are present or both are absent.
    pub(crate) fn normalize(&mut self) {
        if self.access_token.is_none() || self.refresh_token.is_none() {
            self.access_token = None;
            self.refresh_token = None;
        }
    }
}

impl std::fmt::Debug for StoredCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredCredentials")
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "***"))
            .field("username", &self.username)
            .finish()
    }
}

#[async_trait]
pub trait SecureStorage: Send + Sync {
    /// Returns the stored document, or an empty one when nothing was saved yet.
    async fn load(&self) -> Result<StoredCredentials, CredentialError>;

    /// Replaces the stored document.
    async fn store(&self, credentials: &StoredCredentials) -> Result<(), CredentialError>;

    /// Removes every entry.
    async fn wipe(&self) -> Result<(), CredentialError>;
}

/// Process-local backend, used for tests and `--memory-store` sessions.
#[derive(Default)]
pub struct MemoryStorage {
    document: Mutex<StoredCredentials>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecureStorage for MemoryStorage {
    async fn load(&self) -> Result<StoredCredentials, CredentialError> {
        Ok(self.document.lock().await.clone())
    }

    async fn store(&self, credentials: &StoredCredentials) -> Result<(), CredentialError> {
        *self.document.lock().await = credentials.clone();
        Ok(())
    }

    async fn wipe(&self) -> Result<(), CredentialError> {
        *self.document.lock().await = StoredCredentials::default();
        Ok(())
    }
}
