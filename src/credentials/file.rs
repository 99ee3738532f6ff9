//! Encrypted file backend.
//!
//! The credential document is sealed with ChaCha20-Poly1305 and written to
//! `credentials.bin`. The 32-byte key lives next to it in `credentials.key`
//! (base64, mode `0600`) and is generated on the first write. Writes go to an
//! owner-only temporary sibling which is persisted over the target, so a crash
//! never leaves a torn document behind.

use super::{
    CredentialError,
    crypto::{self, KEY_LEN},
    storage::{SecureStorage, StoredCredentials},
};
use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use std::{
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::{debug, instrument};

const CREDENTIALS_FILE: &str = "credentials.bin";
const KEY_FILE: &str = "credentials.key";

#[derive(Debug, Clone)]
pub struct EncryptedFileStorage {
    dir: PathBuf,
}

impl EncryptedFileStorage {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Per-user data directory, e.g. `~/.local/share/facegate`.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::data_local_dir().map(|dir| dir.join(env!("CARGO_PKG_NAME")))
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn credentials_path(&self) -> PathBuf {
        self.dir.join(CREDENTIALS_FILE)
    }

    fn key_path(&self) -> PathBuf {
        self.dir.join(KEY_FILE)
    }

    async fn read_key(&self) -> Result<Option<[u8; KEY_LEN]>, CredentialError> {
        let encoded = match fs::read_to_string(self.key_path()).await {
            Ok(encoded) => encoded,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let bytes = Base64::decode_vec(encoded.trim()).map_err(|_| CredentialError::InvalidKey)?;
        let key: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| CredentialError::InvalidKey)?;

        Ok(Some(key))
    }

    async fn key_or_create(&self) -> Result<[u8; KEY_LEN], CredentialError> {
        if let Some(key) = self.read_key().await? {
            return Ok(key);
        }

        debug!(dir = %self.dir.display(), "generating credential key");
        let key = crypto::generate_key();
        write_private(&self.dir, &self.key_path(), Base64::encode_string(&key).into_bytes()).await?;

        Ok(key)
    }
}

#[async_trait]
impl SecureStorage for EncryptedFileStorage {
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    async fn load(&self) -> Result<StoredCredentials, CredentialError> {
        let sealed = match fs::read(self.credentials_path()).await {
            Ok(sealed) => sealed,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Ok(StoredCredentials::default());
            }
            Err(err) => return Err(err.into()),
        };

        // A document without its key can never be opened again.
        let key = self.read_key().await?.ok_or(CredentialError::Decrypt)?;
        let plaintext = crypto::open(&key, &sealed)?;

        Ok(serde_json::from_slice(&plaintext)?)
    }

    #[instrument(skip_all, fields(dir = %self.dir.display()))]
    async fn store(&self, credentials: &StoredCredentials) -> Result<(), CredentialError> {
        if credentials.is_empty() {
            return self.wipe().await;
        }

        fs::create_dir_all(&self.dir).await?;
        let key = self.key_or_create().await?;

        let plaintext = serde_json::to_vec(credentials)?;
        let sealed = crypto::seal(&key, &plaintext)?;

        write_private(&self.dir, &self.credentials_path(), sealed).await
    }

    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    async fn wipe(&self) -> Result<(), CredentialError> {
        match fs::remove_file(self.credentials_path()).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Writes `contents` to a temporary file in `dir`, created with mode `0600`,
/// then persists it over `path`. The temporary file is removed if that fails.
async fn write_private(dir: &Path, path: &Path, contents: Vec<u8>) -> Result<(), CredentialError> {
    fs::create_dir_all(dir).await?;

    let dir = dir.to_path_buf();
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<(), CredentialError> {
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&contents)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|err| err.error)?;
        Ok(())
    })
    .await
    .map_err(|err| CredentialError::Io(std::io::Error::other(err)))?
}
