//! Protocol constants for the Fenris secure channel (protocol version 1).
//!
//! These values are fixed by the protocol and MUST match between peers.
//! Nothing here is negotiated on the wire.

use std::time::Duration;

// =============================================================================
// CRYPTOGRAPHIC CONSTANTS
// =============================================================================

/// Poly1305 authentication tag size.
pub const AEAD_TAG_SIZE: usize = 16;

/// XChaCha20 nonce size.
pub const AEAD_NONCE_SIZE: usize = 24;

/// X25519 public key size.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// X25519 shared secret size.
pub const SHARED_SECRET_SIZE: usize = 32;

/// Session key size (XChaCha20 key).
pub const SESSION_KEY_SIZE: usize = 32;

/// HKDF info label used to derive the session key from the ECDH output.
pub const KDF_INFO: &[u8] = b"fenris v1 session key";

// =============================================================================
// FRAME SIZES
// =============================================================================

/// Length prefix width (u32, big-endian).
pub const FRAME_HEADER_SIZE: usize = 4;

/// Largest frame payload accepted by default (32 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 32 * 1024 * 1024;

/// Smallest well-formed secure message: nonce plus tag of an empty plaintext.
pub const MIN_SECURE_MESSAGE_SIZE: usize = AEAD_NONCE_SIZE + AEAD_TAG_SIZE;

/// Consecutive zero-length writes tolerated before a write is abandoned.
pub const MAX_ZERO_WRITE_RETRIES: u32 = 16;

// =============================================================================
// TIMING
// =============================================================================

/// TCP connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on a single handshake frame read/write.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause before retrying after a failed `accept` (e.g. descriptor exhaustion).
pub const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(50);
