//! # Fenris Channel
//!
//! Secure request/response channel over TCP.
//!
//! A client and server agree on a fresh session key with an ephemeral
//! X25519 exchange, then exchange length-prefixed, XChaCha20-Poly1305
//! encrypted messages. It provides:
//!
//! - **Framing**: `[u32 BE length][payload]` with a configurable maximum
//! - **Key agreement**: X25519 + HKDF-SHA256, fresh keys per connection
//! - **Confidentiality and integrity**: AEAD with a random 24-byte nonce per message
//! - **Connection management**: thread-safe connect/send/receive/disconnect,
//!   where `disconnect` from any thread unblocks a pending receive
//!
//! ## Feature Flags
//!
//! - `client` (default): [`client::ConnectionManager`]
//! - `server` (default): [`server::Server`] and per-client sessions
//!
//! ## Modules
//!
//! - [`core`]: Constants and crypto error type (always included)
//! - [`transport`]: Length-prefixed framing
//! - [`crypto`]: Key exchange, key derivation, AEAD
//! - [`channel`]: Handshake and encrypted message exchange
//! - [`message`]: Request/response schema
//!
//! ## Example Usage
//!
//! ```no_run
//! use fenris_channel::prelude::*;
//!
//! let config = ConnectionManagerBuilder::new()
//!     .host("127.0.0.1")
//!     .port(7777)
//!     .build();
//! let manager = ConnectionManager::new(config);
//!
//! if manager.connect() {
//!     manager.send_request(&Request::ping("hello"));
//!     if let Some(response) = manager.receive_response() {
//!         assert_eq!(response.response_type, ResponseType::Pong);
//!     }
//!     manager.send_request(&Request::terminate());
//!     manager.receive_response();
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

pub mod channel;
pub mod crypto;
pub mod message;
pub mod transport;

// Client API (feature-gated)
#[cfg(feature = "client")]
#[cfg_attr(docsrs, doc(cfg(feature = "client")))]
pub mod client;

// Server API (feature-gated)
#[cfg(feature = "server")]
#[cfg_attr(docsrs, doc(cfg(feature = "server")))]
pub mod server;

/// Any error produced by this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Cryptographic failure.
    #[error(transparent)]
    Crypto(#[from] core::CryptoError),

    /// Framing or socket failure.
    #[error(transparent)]
    Network(#[from] transport::NetworkError),

    /// Secure channel failure.
    #[error(transparent)]
    Channel(#[from] channel::ChannelError),

    /// Message encoding failure.
    #[error(transparent)]
    Codec(#[from] message::CodecError),

    /// Client failure.
    #[cfg(feature = "client")]
    #[error(transparent)]
    Client(#[from] client::ClientError),

    /// Server failure.
    #[cfg(feature = "server")]
    #[error(transparent)]
    Server(#[from] server::ServerError),
}

/// Result type using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::channel::{ChannelError, ChannelPhase, Role, SecureChannel};
    pub use crate::core::*;
    pub use crate::message::{Request, RequestType, Response, ResponseType};
    pub use crate::Error;

    #[cfg(feature = "client")]
    pub use crate::client::{ClientConfig, ClientError, ConnectionManager, ConnectionManagerBuilder};

    #[cfg(feature = "server")]
    pub use crate::server::{
        RequestHandler, Server, ServerBuilder, ServerConfig, ServerError, ServerHandle, ServerSession,
    };
}
