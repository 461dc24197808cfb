//! Error types shared across the Fenris channel layers.

use thiserror::Error;

/// Errors in the crypto layer.
///
/// Every variant is non-retryable at this layer; callers decide whether the
/// connection survives.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The remote public key is not a usable X25519 point.
    #[error("invalid peer public key")]
    InvalidPeerKey,

    /// AEAD decryption failed (invalid tag, truncated or corrupted input).
    #[error("authentication failed (invalid tag or corrupted ciphertext)")]
    AuthenticationFailed,

    /// AEAD encryption failed.
    #[error("AEAD encryption failed")]
    EncryptionFailed,

    /// Key derivation failed.
    #[error("key derivation failed")]
    KeyDerivationFailed,

    /// Key material has the wrong width for the cipher.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected length in bytes.
        expected: usize,
        /// Actual length in bytes.
        actual: usize,
    },
}
