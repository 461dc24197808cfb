//! Fenris Server
//!
//! Responder side of the secure channel: accept, handshake, then answer
//! requests until the client terminates.

#[allow(clippy::module_inception)]
mod server;
mod session;

pub use server::{Server, ServerBuilder, ServerConfig, ServerError, ServerHandle};
pub use session::*;
