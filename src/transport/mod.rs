//! Fenris Channel - Framing Layer
//!
//! Reads and writes length-prefixed byte blocks over any blocking byte
//! stream ([`std::io::Read`] / [`std::io::Write`]), typically a
//! [`std::net::TcpStream`].
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │     Connection Manager / Server         │
//! ├─────────────────────────────────────────┤
//! │      Secure Channel Protocol            │
//! ├─────────────────────────────────────────┤
//! │          Framing Layer                  │  ← This module
//! │   [len u32 BE][payload]                 │
//! ├─────────────────────────────────────────┤
//! │              TCP                        │
//! └─────────────────────────────────────────┘
//! ```

mod error;
mod frame;

pub use error::*;
pub use frame::{read_frame, write_frame};
