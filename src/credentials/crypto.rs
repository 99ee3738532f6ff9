use super::CredentialError;
use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use rand::{RngCore, rngs::OsRng};

pub const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// AAD = "facegate-credentials:v1"; bumping the version invalidates old documents.
const AAD: &[u8] = b"facegate-credentials:v1";

/// Generates a fresh data-encryption key from the OS RNG.
#[must_use]
pub fn generate_key() -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut key);
    key
}

/// Encrypts the credential document.
/// Returns `nonce (12 bytes) || ciphertext`.
///
/// # Errors
/// Returns an error if encryption fails.
#[allow(deprecated)]
pub fn seal(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<Vec<u8>, CredentialError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad: AAD,
            },
        )
        .map_err(|_| CredentialError::Encrypt)?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);

    Ok(sealed)
}

/// Decrypts a document produced by [`seal`].
///
/// # Errors
/// Returns an error if the data is truncated, was tampered with, or the key is wrong.
#[allow(deprecated)]
pub fn open(key: &[u8; KEY_LEN], data: &[u8]) -> Result<Vec<u8>, CredentialError> {
    if data.len() < NONCE_LEN {
        return Err(CredentialError::Decrypt);
    }

    let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));

    cipher
        .decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload {
                msg: ciphertext,
                aad: AAD,
            },
        )
        .map_err(|_| CredentialError::Decrypt)
}
