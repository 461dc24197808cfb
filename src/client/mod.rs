//! Fenris Client - Connection Manager
//!
//! Blocking client API: connect, exchange request/response pairs over the
//! secure channel, disconnect from any thread.

mod config;
mod connection;
mod error;

pub use config::*;
pub use connection::ConnectionManager;
pub use error::*;
