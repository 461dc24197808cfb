//! Fenris Channel - Crypto Engine
//!
//! Stateless cryptographic operations for the secure channel:
//! - X25519 ephemeral key exchange ([`generate_keypair`], [`compute_shared_secret`])
//! - HKDF-SHA256 session key derivation ([`derive_key`])
//! - XChaCha20-Poly1305 AEAD with random nonces ([`encrypt`], [`decrypt`], [`generate_nonce`])
//!
//! Nothing here keeps state between calls; keys and nonces are always
//! passed in explicitly.

mod aead;
mod kdf;
mod keys;

pub use aead::{decrypt, encrypt, generate_nonce, Nonce, SessionKey};
pub use kdf::{derive_key, SymmetricKey};
pub use keys::{compute_shared_secret, generate_keypair, PrivateKey, PublicKey, SharedSecret};
