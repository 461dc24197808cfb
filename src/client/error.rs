//! Client error types.

use std::io;

use thiserror::Error;

use crate::channel::ChannelError;

/// Errors that can occur in the Fenris client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// `connect` was called while a session is established.
    #[error("already connected")]
    AlreadyConnected,

    /// Another thread is currently connecting.
    #[error("connect already in progress")]
    ConnectInProgress,

    /// The operation needs an established session.
    #[error("not connected")]
    NotConnected,

    /// The host name did not resolve to any address.
    #[error("cannot resolve {0}")]
    Resolve(String),

    /// Failed to open the TCP connection.
    #[error("connection failed: {0}")]
    Connect(io::Error),

    /// Handshake or message exchange failed.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
}
