//! Durable, encrypted-at-rest storage for the token pair and the last
//! authenticated display name.
//!
//! Every operation runs under one async mutex and rewrites the whole document,
//! so the interceptor (refresh) and the session manager (login/logout) never see
//! half of a token pair. Tokens are handed out as `SecretString` and are never
//! logged.

pub mod crypto;
pub mod file;
#[cfg(feature = "keyring")]
pub mod keychain;
pub mod storage;

pub use file::EncryptedFileStorage;
#[cfg(feature = "keyring")]
pub use keychain::KeyringStorage;
pub use storage::{MemoryStorage, SecureStorage, StoredCredentials};

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("credential document is malformed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("credential encryption failed")]
    Encrypt,
    #[error("credential document could not be decrypted")]
    Decrypt,
    #[error("credential key file is invalid")]
    InvalidKey,
    #[error("secure storage backend failed: {0}")]
    Backend(String),
}

/// Short-lived access token plus long-lived refresh token.
#[derive(Clone)]
pub struct TokenPair {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
}

impl TokenPair {
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: SecretString::from(refresh_token.into()),
        }
    }
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"***")
            .field("refresh_token", &"***")
            .finish()
    }
}

#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<Mutex<Box<dyn SecureStorage>>>,
}

impl CredentialStore {
    pub fn new(backend: impl SecureStorage + 'static) -> Self {
        Self {
            backend: Arc::new(Mutex::new(Box::new(backend))),
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new())
    }

    /// Stores both tokens in one write; the saved username is kept.
    ///
    /// # Errors
    /// Returns an error if the backend cannot persist the document.
    #[instrument(skip_all)]
    pub async fn save_tokens(
        &self,
        access_token: &SecretString,
        refresh_token: &SecretString,
    ) -> Result<(), CredentialError> {
        let backend = self.backend.lock().await;
        let mut document = backend.load().await?;
        document.access_token = Some(access_token.expose_secret().to_string());
        document.refresh_token = Some(refresh_token.expose_secret().to_string());
        backend.store(&document).await?;
        debug!("token pair stored");
        Ok(())
    }

    /// # Errors
    /// Returns an error if the backend cannot be read.
    pub async fn access_token(&self) -> Result<Option<SecretString>, CredentialError> {
        Ok(self.load().await?.access_token.map(SecretString::from))
    }

    /// # Errors
    /// Returns an error if the backend cannot be read.
    pub async fn refresh_token(&self) -> Result<Option<SecretString>, CredentialError> {
        Ok(self.load().await?.refresh_token.map(SecretString::from))
    }

    /// Reads both tokens from a single snapshot of the document.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be read.
    pub async fn tokens(&self) -> Result<Option<TokenPair>, CredentialError> {
        let document = self.load().await?;
        Ok(match (document.access_token, document.refresh_token) {
            (Some(access), Some(refresh)) => Some(TokenPair::new(access, refresh)),
            _ => None,
        })
    }

    /// # Errors
    /// Returns an error if the backend cannot persist the document.
    #[instrument(skip(self))]
    pub async fn save_username(&self, name: &str) -> Result<(), CredentialError> {
        let backend = self.backend.lock().await;
        let mut document = backend.load().await?;
        document.username = Some(name.to_string());
        backend.store(&document).await
    }

    /// # Errors
    /// Returns an error if the backend cannot be read.
    pub async fn username(&self) -> Result<Option<String>, CredentialError> {
        Ok(self.load().await?.username)
    }

    /// Drops the token pair but keeps the saved username.
    ///
    /// # Errors
    /// Returns an error if the backend cannot persist the document.
    #[instrument(skip(self))]
    pub async fn clear_tokens(&self) -> Result<(), CredentialError> {
        let backend = self.backend.lock().await;
        let mut document = backend.load().await?;
        document.access_token = None;
        document.refresh_token = None;
        backend.store(&document).await?;
        debug!("token pair discarded");
        Ok(())
    }

    /// Removes the token pair and the saved username together. This is the only
    /// way to fully reset local identity state.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be wiped.
    #[instrument(skip(self))]
    pub async fn clear_all(&self) -> Result<(), CredentialError> {
        self.backend.lock().await.wipe().await?;
        debug!("local credentials cleared");
        Ok(())
    }

    async fn load(&self) -> Result<StoredCredentials, CredentialError> {
        let mut document = self.backend.lock().await.load().await?;
        document.normalize();
        Ok(document)
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}
