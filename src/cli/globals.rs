use crate::{
    api::ApiClient,
    credentials::{CredentialStore, EncryptedFileStorage},
    session::SessionManager,
};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Where the credential document lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreLocation {
    Directory(PathBuf),
    /// Process-local; forgotten on exit.
    Memory,
    #[cfg(feature = "keyring")]
    Keyring,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Connection {
    pub server_url: String,
    pub store: StoreLocation,
}

/// Process-wide context, created once per command and passed explicitly.
#[derive(Clone)]
pub struct GlobalArgs {
    pub server_url: String,
    pub store: StoreLocation,
    pub credentials: CredentialStore,
    pub api: ApiClient,
    pub session: SessionManager,
}

impl GlobalArgs {
    /// # Errors
    /// Returns an error if the server URL is invalid or the keychain entry
    /// cannot be opened.
    pub fn new(connection: &Connection) -> Result<Self> {
        let credentials = match &connection.store {
            StoreLocation::Directory(dir) => CredentialStore::new(EncryptedFileStorage::new(dir)),
            StoreLocation::Memory => CredentialStore::in_memory(),
            #[cfg(feature = "keyring")]
            StoreLocation::Keyring => CredentialStore::new(
                crate::credentials::KeyringStorage::new(env!("CARGO_PKG_NAME"), "session")
                    .context("failed to open the OS keychain")?,
            ),
        };

        let api = ApiClient::new(&connection.server_url, credentials.clone())
            .with_context(|| format!("invalid server URL: {}", connection.server_url))?;
        let session = SessionManager::new(api.clone());

        Ok(Self {
            server_url: api.base_url().to_string(),
            store: connection.store.clone(),
            credentials,
            api,
            session,
        })
    }
}

impl std::fmt::Debug for GlobalArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalArgs")
            .field("server_url", &self.server_url)
            .field("store", &self.store)
            .field("credentials", &"***")
            .field("session", &self.session.status())
            .finish_non_exhaustive()
    }
}
