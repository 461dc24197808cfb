//! Per-connection channel state machine.
//!
//! ```text
//! AwaitingHandshake ──handshake()──▶ Established ──close() / any error──▶ Closed
//!         │                                                                ▲
//!         └──────────────────────── handshake error ───────────────────────┘
//! ```

use std::io::{Read, Write};

use tracing::debug;

use super::codec::{receive_message, send_message};
use super::error::{ChannelError, ChannelResult};
use super::handshake::{perform_handshake, Role};
use crate::crypto::SessionKey;

/// Lifecycle phase of a [`SecureChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPhase {
    /// Stream is open, no key yet.
    AwaitingHandshake,
    /// Session key established; messages can flow.
    Established,
    /// Key discarded; the channel cannot be reused.
    Closed,
}

/// A secure channel over any blocking byte stream.
///
/// Owns the stream and, while [`ChannelPhase::Established`], the session key.
/// Every failure is terminal: the key is dropped (and zeroized) and the
/// phase moves to [`ChannelPhase::Closed`].
#[derive(Debug)]
pub struct SecureChannel<S> {
    stream: S,
    role: Role,
    phase: ChannelPhase,
    key: Option<SessionKey>,
    max_frame_size: usize,
}

impl<S: Read + Write> SecureChannel<S> {
    /// Wrap a freshly opened stream.
    pub fn new(stream: S, role: Role, max_frame_size: usize) -> Self {
        Self {
            stream,
            role,
            phase: ChannelPhase::AwaitingHandshake,
            key: None,
            max_frame_size,
        }
    }

    /// Run the key exchange.
    ///
    /// # Errors
    /// [`ChannelError::NotEstablished`] if called outside
    /// [`ChannelPhase::AwaitingHandshake`]; otherwise any handshake failure,
    /// after which the channel is closed.
    pub fn handshake(&mut self) -> ChannelResult<()> {
        if self.phase != ChannelPhase::AwaitingHandshake {
            return Err(ChannelError::NotEstablished);
        }

        match perform_handshake(&mut self.stream, self.role) {
            Ok(key) => {
                self.key = Some(key);
                self.phase = ChannelPhase::Established;
                Ok(())
            }
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    /// Encrypt and send one message.
    pub fn send(&mut self, payload: &[u8]) -> ChannelResult<()> {
        let key = self.key.as_ref().ok_or(ChannelError::NotEstablished)?;
        let result = send_message(&mut self.stream, key, payload);
        self.close_on_error(result)
    }

    /// Receive and decrypt one message.
    pub fn receive(&mut self) -> ChannelResult<Vec<u8>> {
        let key = self.key.as_ref().ok_or(ChannelError::NotEstablished)?;
        let result = receive_message(&mut self.stream, key, self.max_frame_size);
        self.close_on_error(result)
    }

    /// Discard the session key and mark the channel closed.
    ///
    /// The stream itself is left to the owner (see [`SecureChannel::get_ref`]
    /// and [`SecureChannel::into_inner`]).
    pub fn close(&mut self) {
        if self.phase != ChannelPhase::Closed {
            debug!(role = ?self.role, "secure channel closed");
        }
        self.key = None;
        self.phase = ChannelPhase::Closed;
    }

    /// Current phase.
    pub fn phase(&self) -> ChannelPhase {
        self.phase
    }

    /// Whether messages can currently be sent and received.
    pub fn is_established(&self) -> bool {
        self.phase == ChannelPhase::Established
    }

    /// Our handshake role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Close the channel and return the underlying stream.
    pub fn into_inner(mut self) -> S {
        self.key = None;
        self.stream
    }

    fn close_on_error<T>(&mut self, result: ChannelResult<T>) -> ChannelResult<T> {
        if result.is_err() {
            self.close();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    use super::*;
    use crate::core::DEFAULT_MAX_FRAME_SIZE;

    fn connected_pair() -> (SecureChannel<TcpStream>, SecureChannel<TcpStream>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut channel = SecureChannel::new(stream, Role::Responder, DEFAULT_MAX_FRAME_SIZE);
            channel.handshake().unwrap();
            channel
        });

        let stream = TcpStream::connect(addr).unwrap();
        let mut client = SecureChannel::new(stream, Role::Initiator, DEFAULT_MAX_FRAME_SIZE);
        client.handshake().unwrap();

        (client, server.join().unwrap())
    }

    #[test]
    fn test_lifecycle() {
        let (mut client, mut server) = connected_pair();
        assert_eq!(client.phase(), ChannelPhase::Established);
        assert_eq!(server.phase(), ChannelPhase::Established);

        client.send(b"hello").unwrap();
        assert_eq!(server.receive().unwrap(), b"hello");
        server.send(b"world").unwrap();
        assert_eq!(client.receive().unwrap(), b"world");

        client.close();
        assert_eq!(client.phase(), ChannelPhase::Closed);
        assert!(matches!(client.send(b"late"), Err(ChannelError::NotEstablished)));
    }

    #[test]
    fn test_operations_require_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let stream = TcpStream::connect(listener.local_addr().unwrap()).unwrap();

        let mut channel = SecureChannel::new(stream, Role::Initiator, DEFAULT_MAX_FRAME_SIZE);
        assert_eq!(channel.phase(), ChannelPhase::AwaitingHandshake);
        assert!(matches!(channel.send(b"x"), Err(ChannelError::NotEstablished)));
        assert!(matches!(channel.receive(), Err(ChannelError::NotEstablished)));
    }

    #[test]
    fn test_handshake_cannot_be_repeated() {
        let (mut client, _server) = connected_pair();
        assert!(matches!(client.handshake(), Err(ChannelError::NotEstablished)));
        assert!(client.is_established());
    }

    #[test]
    fn test_peer_close_closes_channel() {
        let (mut client, server) = connected_pair();
        drop(server);

        assert!(matches!(client.receive(), Err(ChannelError::Disconnected)));
        assert_eq!(client.phase(), ChannelPhase::Closed);
    }

    #[test]
    fn test_failed_handshake_closes_channel() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let peer = thread::spawn(move || {
            // Accept and hang up without sending a key.
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });

        let stream = TcpStream::connect(addr).unwrap();
        let mut channel = SecureChannel::new(stream, Role::Responder, DEFAULT_MAX_FRAME_SIZE);
        peer.join().unwrap();

        assert!(channel.handshake().is_err());
        assert_eq!(channel.phase(), ChannelPhase::Closed);
    }
}
