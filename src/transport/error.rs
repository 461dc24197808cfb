//! Framing layer error types.

use std::io;

use thiserror::Error;

/// Errors raised while reading or writing length-prefixed frames.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The peer closed the stream before a complete frame arrived.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// The advertised or requested frame length is zero or above the limit.
    #[error("invalid frame size {size} (max {max})")]
    InvalidFrameSize {
        /// Length found in (or requested for) the frame header.
        size: usize,
        /// Largest accepted length.
        max: usize,
    },

    /// A socket read or write timeout expired.
    #[error("socket operation timed out")]
    Timeout,

    /// I/O error (socket operations).
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl NetworkError {
    /// Classify a raw I/O error, folding timeouts into [`NetworkError::Timeout`]
    /// and premature EOF into [`NetworkError::ConnectionClosed`].
    pub fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => NetworkError::Timeout,
            io::ErrorKind::UnexpectedEof => NetworkError::ConnectionClosed,
            _ => NetworkError::Io(err),
        }
    }

    /// Check if this error means the peer (or a local shutdown) ended the
    /// connection, as opposed to a protocol violation or a timeout.
    pub fn is_disconnect(&self) -> bool {
        match self {
            NetworkError::ConnectionClosed => true,
            NetworkError::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }

    /// Check if this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, NetworkError::Timeout)
    }
}

/// Result type for framing operations.
pub type NetworkResult<T> = Result<T, NetworkError>;
