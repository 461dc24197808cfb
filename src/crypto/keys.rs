//! Ephemeral X25519 key exchange.
//!
//! A fresh keypair is generated for every handshake attempt. The private half
//! is consumed by [`compute_shared_secret`], so it cannot outlive the
//! exchange or be reused for a second session.

use std::fmt;

use rand::rngs::OsRng;
use x25519_dalek::EphemeralSecret;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::core::{CryptoError, PUBLIC_KEY_SIZE, SHARED_SECRET_SIZE};

/// Ephemeral X25519 private key.
///
/// Never serialized, cloned, or printed.
pub struct PrivateKey {
    secret: EphemeralSecret,
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey([redacted])")
    }
}

/// X25519 public key as sent on the wire (32 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; PUBLIC_KEY_SIZE]);

impl PublicKey {
    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse a public key received from a peer.
    ///
    /// # Errors
    /// Returns `InvalidPeerKey` if `bytes` is not exactly 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let raw: [u8; PUBLIC_KEY_SIZE] =
            bytes.try_into().map_err(|_| CryptoError::InvalidPeerKey)?;
        Ok(Self(raw))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Raw ECDH output. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret {
    bytes: [u8; SHARED_SECRET_SIZE],
}

impl SharedSecret {
    /// Get the raw secret bytes.
    ///
    /// # Security
    /// Only meant to feed the key derivation function.
    pub fn as_bytes(&self) -> &[u8; SHARED_SECRET_SIZE] {
        &self.bytes
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret([redacted])")
    }
}

/// Generate a fresh ephemeral keypair from the OS CSPRNG.
pub fn generate_keypair() -> (PrivateKey, PublicKey) {
    let secret = EphemeralSecret::random_from_rng(OsRng);
    let public = x25519_dalek::PublicKey::from(&secret);
    (PrivateKey { secret }, PublicKey(public.to_bytes()))
}

/// Compute the X25519 shared secret, consuming the local private key.
///
/// # Errors
/// Returns `InvalidPeerKey` if the exchange is non-contributory, which is the
/// case for low-order peer points such as the all-zero key.
pub fn compute_shared_secret(
    local_private: PrivateKey,
    remote_public: &PublicKey,
) -> Result<SharedSecret, CryptoError> {
    let remote = x25519_dalek::PublicKey::from(remote_public.0);
    let shared = local_private.secret.diffie_hellman(&remote);

    if !shared.was_contributory() {
        return Err(CryptoError::InvalidPeerKey);
    }

    Ok(SharedSecret {
        bytes: shared.to_bytes(),
    })
}
