//! Ephemeral ECDH handshake.
//!
//! ```text
//! Initiator (client)                     Responder (server)
//!   generate (a, A)                        generate (b, B)
//!   [len][A]  ───────────────────────────▶
//!             ◀─────────────────────────── [len][B]
//!   K = HKDF(X25519(a, B))                 K = HKDF(X25519(b, A))
//! ```
//!
//! The initiator always writes first. Both ephemeral private keys are
//! consumed by the DH computation and the raw shared secret is zeroized as
//! soon as the session key is derived, on success and on every error path.
//!
//! The exchange is unauthenticated: it gives confidentiality and integrity
//! against passive observers, not proof of the peer's identity.

use std::io::{Read, Write};

use tracing::{debug, warn};

use super::error::{ChannelError, ChannelResult};
use crate::core::{CryptoError, PUBLIC_KEY_SIZE, SESSION_KEY_SIZE};
use crate::crypto::{compute_shared_secret, derive_key, generate_keypair, PublicKey, SessionKey};
use crate::transport::{read_frame, write_frame, NetworkError};

/// Which side of the handshake we play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Connecting side; sends its public key first.
    Initiator,
    /// Accepting side; reads the initiator's key first.
    Responder,
}

/// Run the key exchange over `stream` and return the derived session key.
///
/// # Errors
/// - [`ChannelError::Disconnected`] / [`ChannelError::Io`] /
///   [`ChannelError::Timeout`] if a key frame cannot be exchanged.
/// - [`CryptoError::InvalidPeerKey`] if the peer's key frame is not exactly
///   32 bytes or yields a non-contributory shared secret.
/// - [`CryptoError::KeyDerivationFailed`] if HKDF fails.
pub fn perform_handshake<S: Read + Write + ?Sized>(stream: &mut S, role: Role) -> ChannelResult<SessionKey> {
    let (local_private, local_public) = generate_keypair();

    let peer_public = match role {
        Role::Initiator => {
            write_frame(stream, local_public.as_bytes())?;
            read_peer_key(stream)?
        }
        Role::Responder => {
            let peer = read_peer_key(stream)?;
            write_frame(stream, local_public.as_bytes())?;
            peer
        }
    };

    let shared = compute_shared_secret(local_private, &peer_public).inspect_err(|e| {
        warn!(?role, error = %e, "handshake rejected peer key");
    })?;
    let key = SessionKey::try_from(derive_key(&shared, SESSION_KEY_SIZE)?)?;

    debug!(?role, "handshake complete");
    Ok(key)
}

/// Read the peer's public-key frame. Only a 32-byte frame is accepted, so a
/// hostile peer cannot make the handshake buffer more than that.
fn read_peer_key<S: Read + ?Sized>(stream: &mut S) -> ChannelResult<PublicKey> {
    let bytes = match read_frame(stream, PUBLIC_KEY_SIZE) {
        Ok(bytes) => bytes,
        Err(NetworkError::InvalidFrameSize { size, .. }) => {
            warn!(size, "peer sent a key frame of the wrong size");
            return Err(ChannelError::Crypto(CryptoError::InvalidPeerKey));
        }
        Err(e) => return Err(e.into()),
    };

    Ok(PublicKey::from_slice(&bytes)?)
}
