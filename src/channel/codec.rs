//! Steady-state message encoding: encrypt-then-frame and its inverse.
//!
//! Secure message layout (one frame payload):
//! ```text
//! +-----------------+--------------------------------+
//! | nonce (24 B)    | ciphertext || tag (len + 16 B) |
//! +-----------------+--------------------------------+
//! ```

use std::io::{Read, Write};

use tracing::{trace, warn};

use super::error::{ChannelError, ChannelResult};
use crate::core::AEAD_NONCE_SIZE;
use crate::crypto::{decrypt, encrypt, generate_nonce, Nonce, SessionKey};
use crate::transport::{read_frame, write_frame};

/// Build the wire payload for `plaintext`: a fresh nonce followed by the
/// sealed ciphertext.
pub fn seal(key: &SessionKey, plaintext: &[u8]) -> ChannelResult<Vec<u8>> {
    let nonce = generate_nonce();
    let ciphertext = encrypt(plaintext, key, &nonce)?;

    let mut message = Vec::with_capacity(AEAD_NONCE_SIZE + ciphertext.len());
    message.extend_from_slice(nonce.as_bytes());
    message.extend_from_slice(&ciphertext);
    Ok(message)
}

/// Split a wire payload into nonce and ciphertext and decrypt it.
///
/// # Errors
/// - [`ChannelError::MalformedMessage`] if the payload is shorter than the nonce.
/// - [`ChannelError::Crypto`] with `AuthenticationFailed` if the tag does not verify.
pub fn open(key: &SessionKey, message: &[u8]) -> ChannelResult<Vec<u8>> {
    if message.len() < AEAD_NONCE_SIZE {
        return Err(ChannelError::MalformedMessage(format!(
            "{} byte message is shorter than the {AEAD_NONCE_SIZE} byte nonce",
            message.len()
        )));
    }

    let (nonce, ciphertext) = message.split_at(AEAD_NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce)
        .ok_or_else(|| ChannelError::MalformedMessage("bad nonce prefix".into()))?;

    Ok(decrypt(ciphertext, key, &nonce)?)
}

/// Encrypt `payload` under `key` with a fresh nonce and write it as one frame.
pub fn send_message<S: Write + ?Sized>(stream: &mut S, key: &SessionKey, payload: &[u8]) -> ChannelResult<()> {
    let message = seal(key, payload)?;
    write_frame(stream, &message)?;

    trace!(plaintext = payload.len(), frame = message.len(), "message sent");
    Ok(())
}

/// Read one frame and decrypt it under `key`.
///
/// # Errors
/// - [`ChannelError::Disconnected`] if the peer closed or the socket was shut down.
/// - [`ChannelError::InvalidFrame`] if the frame length is zero or above `max_frame_size`.
/// - [`ChannelError::MalformedMessage`] if the frame cannot hold a nonce.
/// - [`ChannelError::Crypto`] with `AuthenticationFailed` on tag mismatch.
pub fn receive_message<S: Read + ?Sized>(
    stream: &mut S,
    key: &SessionKey,
    max_frame_size: usize,
) -> ChannelResult<Vec<u8>> {
    let message = read_frame(stream, max_frame_size)?;

    let plaintext = open(key, &message).inspect_err(|e| {
        warn!(frame = message.len(), error = %e, "dropping undecryptable message");
    })?;

    trace!(frame = message.len(), plaintext = plaintext.len(), "message received");
    Ok(plaintext)
}
