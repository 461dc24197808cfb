//! Session key derivation (HKDF-SHA256).
//!
//! The derivation is deterministic: both peers feed the same ECDH output and
//! the same fixed info label, so they arrive at the same key without any
//! further exchange.

use std::fmt;

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::keys::SharedSecret;
use crate::core::{CryptoError, KDF_INFO};

/// Variable-length symmetric key material. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: Vec<u8>,
}

impl SymmetricKey {
    /// Get the raw key bytes.
    ///
    /// # Security
    /// Handle with care - this exposes sensitive key material.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Key length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the key is empty (never true for a derived key).
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymmetricKey({} bytes, [redacted])", self.bytes.len())
    }
}

/// Derive `key_length` bytes of key material from an ECDH shared secret.
///
/// HKDF-SHA256 with no salt and info = `"fenris v1 session key"`.
///
/// # Errors
/// Returns `KeyDerivationFailed` if `key_length` is zero or larger than HKDF
/// can produce (255 * 32 bytes).
pub fn derive_key(shared_secret: &SharedSecret, key_length: usize) -> Result<SymmetricKey, CryptoError> {
    if key_length == 0 {
        return Err(CryptoError::KeyDerivationFailed);
    }

    let hk = Hkdf::<Sha256>::new(None, shared_secret.as_bytes());
    let mut bytes = vec![0u8; key_length];
    if hk.expand(KDF_INFO, &mut bytes).is_err() {
        bytes.zeroize();
        return Err(CryptoError::KeyDerivationFailed);
    }

    Ok(SymmetricKey { bytes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SESSION_KEY_SIZE;
    use crate::crypto::{compute_shared_secret, generate_keypair};

    fn shared_pair() -> (SharedSecret, SharedSecret) {
        let (a_private, a_public) = generate_keypair();
        let (b_private, b_public) = generate_keypair();
        (
            compute_shared_secret(a_private, &b_public).unwrap(),
            compute_shared_secret(b_private, &a_public).unwrap(),
        )
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let (a, b) = shared_pair();

        let key_a = derive_key(&a, SESSION_KEY_SIZE).unwrap();
        let key_b = derive_key(&b, SESSION_KEY_SIZE).unwrap();
        let key_a_again = derive_key(&a, SESSION_KEY_SIZE).unwrap();

        assert_eq!(key_a.as_bytes(), key_b.as_bytes());
        assert_eq!(key_a.as_bytes(), key_a_again.as_bytes());
        assert_eq!(key_a.len(), SESSION_KEY_SIZE);
    }

    #[test]
    fn test_distinct_secrets_give_distinct_keys() {
        let (first, _) = shared_pair();
        let (second, _) = shared_pair();

        let key_first = derive_key(&first, SESSION_KEY_SIZE).unwrap();
        let key_second = derive_key(&second, SESSION_KEY_SIZE).unwrap();
        assert_ne!(key_first.as_bytes(), key_second.as_bytes());
    }

    #[test]
    fn test_shorter_output_is_prefix() {
        // HKDF-Expand output for a shorter length is a prefix of the longer one.
        let (secret, _) = shared_pair();
        let long = derive_key(&secret, 64).unwrap();
        let short = derive_key(&secret, 16).unwrap();
        assert_eq!(&long.as_bytes()[..16], short.as_bytes());
    }

    #[test]
    fn test_invalid_lengths() {
        let (secret, _) = shared_pair();
        assert_eq!(derive_key(&secret, 0).unwrap_err(), CryptoError::KeyDerivationFailed);
        assert_eq!(
            derive_key(&secret, 255 * 32 + 1).unwrap_err(),
            CryptoError::KeyDerivationFailed
        );
        assert!(derive_key(&secret, 255 * 32).is_ok());
    }

    #[test]
    fn test_debug_redacts() {
        let (secret, _) = shared_pair();
        let key = derive_key(&secret, 32).unwrap();
        assert_eq!(format!("{key:?}"), "SymmetricKey(32 bytes, [redacted])");
    }
}
