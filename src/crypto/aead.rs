//! XChaCha20-Poly1305 AEAD encryption
//!
//! Every steady-state message is sealed under the session key with a fresh
//! random 24-byte nonce. The extended nonce makes random generation safe:
//! collisions are negligible for any realistic number of messages per
//! session.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroize;

use super::kdf::SymmetricKey;
use crate::core::{CryptoError, AEAD_NONCE_SIZE, AEAD_TAG_SIZE, SESSION_KEY_SIZE};

/// A session key for AEAD operations.
///
/// Zeroized on drop for security.
pub struct SessionKey {
    key: [u8; SESSION_KEY_SIZE],
}

impl SessionKey {
    /// Create a new session key from bytes.
    pub fn from_bytes(key: [u8; SESSION_KEY_SIZE]) -> Self {
        Self { key }
    }

    /// Get the raw key bytes.
    ///
    /// # Security
    /// Handle with care - this exposes sensitive key material.
    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_SIZE] {
        &self.key
    }
}

impl TryFrom<SymmetricKey> for SessionKey {
    type Error = CryptoError;

    fn try_from(derived: SymmetricKey) -> Result<Self, Self::Error> {
        let key: [u8; SESSION_KEY_SIZE] =
            derived
                .as_bytes()
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: SESSION_KEY_SIZE,
                    actual: derived.len(),
                })?;
        Ok(Self { key })
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey([redacted])")
    }
}

impl Drop for SessionKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// A 24-byte XChaCha20-Poly1305 nonce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Nonce([u8; AEAD_NONCE_SIZE]);

impl Nonce {
    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; AEAD_NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse the nonce prefix of a received message.
    ///
    /// Returns `None` unless `bytes` is exactly [`AEAD_NONCE_SIZE`] long.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; AEAD_NONCE_SIZE] {
        &self.0
    }
}

/// Generate a random nonce from the OS CSPRNG.
pub fn generate_nonce() -> Nonce {
    let mut bytes = [0u8; AEAD_NONCE_SIZE];
    OsRng.fill_bytes(&mut bytes);
    Nonce(bytes)
}

/// Encrypt plaintext using XChaCha20-Poly1305.
///
/// # Returns
/// Ciphertext with appended 16-byte Poly1305 tag
pub fn encrypt(plaintext: &[u8], key: &SessionKey, nonce: &Nonce) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    let xnonce = XNonce::from_slice(nonce.as_bytes());

    cipher
        .encrypt(xnonce, plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)
}

/// Decrypt ciphertext using XChaCha20-Poly1305.
///
/// # Returns
/// Decrypted plaintext, or `AuthenticationFailed` if the tag does not verify
/// or the input is shorter than a tag.
pub fn decrypt(ciphertext: &[u8], key: &SessionKey, nonce: &Nonce) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() < AEAD_TAG_SIZE {
        return Err(CryptoError::AuthenticationFailed);
    }

    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    let xnonce = XNonce::from_slice(nonce.as_bytes());

    cipher
        .decrypt(xnonce, ciphertext)
        .map_err(|_| CryptoError::AuthenticationFailed)
}
