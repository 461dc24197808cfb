//! Secure channel error types.

use std::io;

use thiserror::Error;

use crate::core::CryptoError;
use crate::message::CodecError;
use crate::transport::NetworkError;

/// Coarse failure category, used to decide what a failure means for the
/// connection and the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Refused, reset, closed or timed out. Recoverable by reconnecting.
    Transport,
    /// Malformed frame or message, invalid peer key. Fatal to the connection.
    Protocol,
    /// Tag mismatch or key derivation failure. Fatal to the connection and
    /// possibly a sign of tampering.
    Cryptographic,
}

/// Errors raised by the secure channel protocol.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The peer closed the connection, or it was shut down locally.
    #[error("disconnected")]
    Disconnected,

    /// A socket timeout expired.
    #[error("operation timed out")]
    Timeout,

    /// I/O error not attributable to a disconnect.
    #[error("i/o error: {0}")]
    Io(io::Error),

    /// The peer advertised an unacceptable frame length.
    #[error("invalid frame size {size} (max {max})")]
    InvalidFrame {
        /// Advertised length.
        size: usize,
        /// Largest accepted length.
        max: usize,
    },

    /// A frame was too short to hold a nonce and tag, or otherwise malformed.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Cryptographic failure, carried verbatim from the crypto engine.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// The channel has not completed a handshake, or has been closed.
    #[error("channel not established")]
    NotEstablished,

    /// Decrypted payload is not a valid request/response.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl ChannelError {
    /// Map this error onto the transport / protocol / cryptographic taxonomy.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ChannelError::Disconnected
            | ChannelError::Timeout
            | ChannelError::Io(_)
            | ChannelError::NotEstablished => ErrorCategory::Transport,
            ChannelError::InvalidFrame { .. }
            | ChannelError::MalformedMessage(_)
            | ChannelError::Codec(_)
            | ChannelError::Crypto(CryptoError::InvalidPeerKey) => ErrorCategory::Protocol,
            ChannelError::Crypto(_) => ErrorCategory::Cryptographic,
        }
    }

    /// Check if a received message failed authentication.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, ChannelError::Crypto(CryptoError::AuthenticationFailed))
    }
}

impl From<NetworkError> for ChannelError {
    fn from(err: NetworkError) -> Self {
        if err.is_disconnect() {
            return ChannelError::Disconnected;
        }
        match err {
            NetworkError::Timeout => ChannelError::Timeout,
            NetworkError::InvalidFrameSize { size, max } => ChannelError::InvalidFrame { size, max },
            NetworkError::Io(e) => ChannelError::Io(e),
            NetworkError::ConnectionClosed => ChannelError::Disconnected,
        }
    }
}

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;
