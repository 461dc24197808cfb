//! Fenris Channel - Secure Channel Protocol
//!
//! Orchestrates the ephemeral ECDH handshake and the encrypt-then-frame
//! message exchange on top of the framing layer. Operates on any stream and
//! key handed in by the caller; socket ownership belongs to the connection
//! manager or server session above it.

mod codec;
mod error;
mod handshake;
mod secure;

pub use codec::{open, receive_message, seal, send_message};
pub use error::*;
pub use handshake::{perform_handshake, Role};
pub use secure::{ChannelPhase, SecureChannel};
