//! Client connection manager.
//!
//! Owns one TCP connection and its session key, and drives the
//! `Disconnected ⇄ Connected` lifecycle. `connect` is atomic from the
//! caller's point of view: it either leaves a fully handshaken session
//! installed or closes everything it opened.
//!
//! # Concurrency
//!
//! The established session is an `Arc<Session>` installed in a mutex-guarded
//! slot. The slot lock is only ever held for a swap, never across I/O.
//! Senders and receivers lock separate clones of the socket, so a thread
//! blocked in [`ConnectionManager::receive_response`] holds nothing another
//! thread needs to call [`ConnectionManager::disconnect`]. Disconnecting
//! calls `shutdown(Both)` on a third clone, which the OS guarantees wakes
//! the blocked read; the reader then sees EOF and returns.

use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::config::ClientConfig;
use super::error::ClientError;
use crate::channel::{perform_handshake, receive_message, send_message, ChannelError, Role};
use crate::crypto::SessionKey;
use crate::message::{decode_response, encode_request, Request, Response};

/// An established session: socket handles plus the session key.
struct Session {
    reader: Mutex<TcpStream>,
    writer: Mutex<TcpStream>,
    control: TcpStream,
    key: SessionKey,
    peer_addr: SocketAddr,
    /// Set once a terminate request went out; the next reply ends the session.
    terminate_sent: AtomicBool,
}

impl Session {
    fn new(stream: TcpStream, key: SessionKey) -> std::io::Result<Self> {
        let peer_addr = stream.peer_addr()?;
        let reader = stream.try_clone()?;
        let control = stream.try_clone()?;

        Ok(Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(stream),
            control,
            key,
            peer_addr,
            terminate_sent: AtomicBool::new(false),
        })
    }

    /// Shut down both directions; wakes any thread blocked on this socket.
    fn shutdown(&self) {
        if let Err(e) = self.control.shutdown(Shutdown::Both) {
            // NotConnected just means the peer got there first.
            debug!(error = %e, "socket shutdown");
        }
    }
}

/// Clears the `connecting` flag when a connect attempt ends.
struct ConnectingGuard<'a>(&'a AtomicBool);

impl<'a> ConnectingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Client side of a Fenris connection.
///
/// Every method takes `&self`; share it between threads with an `Arc`.
///
/// # Example
///
/// ```no_run
/// use fenris_channel::client::{ConnectionManager, ConnectionManagerBuilder};
/// use fenris_channel::message::Request;
///
/// let config = ConnectionManagerBuilder::new().host("127.0.0.1").port(7777).build();
/// let manager = ConnectionManager::new(config);
///
/// if manager.connect() && manager.send_request(&Request::ping("hello")) {
///     if let Some(response) = manager.receive_response() {
///         println!("{:?}", response);
///     }
/// }
/// manager.disconnect();
/// ```
pub struct ConnectionManager {
    config: ClientConfig,
    session: Mutex<Option<Arc<Session>>>,
    connecting: AtomicBool,
}

impl ConnectionManager {
    /// Create a disconnected manager.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
            connecting: AtomicBool::new(false),
        }
    }

    /// Connect and handshake. Returns `true` only if now connected.
    pub fn connect(&self) -> bool {
        match self.try_connect() {
            Ok(()) => true,
            Err(e) => {
                warn!(name = %self.config.name, error = %e, "connect failed");
                false
            }
        }
    }

    /// Connect and handshake, reporting why it failed.
    ///
    /// # Errors
    /// - [`ClientError::AlreadyConnected`] if a session is already installed.
    /// - [`ClientError::ConnectInProgress`] if another thread is connecting.
    /// - [`ClientError::Resolve`] / [`ClientError::Connect`] if no TCP
    ///   connection could be opened.
    /// - [`ClientError::Channel`] if the handshake failed; the socket is
    ///   closed before returning.
    pub fn try_connect(&self) -> Result<(), ClientError> {
        if self.is_connected() {
            return Err(ClientError::AlreadyConnected);
        }
        let _guard = ConnectingGuard::acquire(&self.connecting).ok_or(ClientError::ConnectInProgress)?;

        let stream = self.open_stream()?;
        let session = Arc::new(self.establish(stream)?);

        let mut slot = self.session.lock();
        if slot.is_some() {
            drop(slot);
            session.shutdown();
            return Err(ClientError::AlreadyConnected);
        }
        info!(name = %self.config.name, peer = %session.peer_addr, "connected");
        *slot = Some(session);
        Ok(())
    }

    /// Whether a session is established. Safe to call from any thread,
    /// including while another thread is disconnecting.
    pub fn is_connected(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Encrypt and send a request. On a write failure the connection is
    /// torn down and `false` is returned.
    pub fn send_request(&self, request: &Request) -> bool {
        match self.try_send_request(request) {
            Ok(()) => true,
            Err(e) => {
                warn!(name = %self.config.name, error = %e, "send failed");
                false
            }
        }
    }

    /// Encrypt and send a request, reporting why it failed.
    pub fn try_send_request(&self, request: &Request) -> Result<(), ClientError> {
        let session = self.current()?;
        let payload = encode_request(request).map_err(ChannelError::from)?;

        let result = {
            let mut writer = session.writer.lock();
            // Flagged before the bytes leave, so a receiver racing on another
            // thread cannot read the reply without seeing it.
            if request.is_terminate() {
                session.terminate_sent.store(true, Ordering::Release);
            }
            send_message(&mut *writer, &session.key, &payload)
        };

        if let Err(e) = result {
            self.teardown(&session);
            return Err(e.into());
        }

        debug!(name = %self.config.name, command = ?request.command, "request sent");
        Ok(())
    }

    /// Receive and decrypt the next response.
    ///
    /// Returns `None` on any failure (peer closed, local disconnect,
    /// malformed frame, authentication failure), and the connection is torn
    /// down in every such case. Use [`ConnectionManager::try_receive_response`]
    /// to see the cause.
    pub fn receive_response(&self) -> Option<Response> {
        match self.try_receive_response() {
            Ok(response) => Some(response),
            Err(e) => {
                warn!(name = %self.config.name, error = %e, "receive failed");
                None
            }
        }
    }

    /// Receive and decrypt the next response, reporting why it failed.
    ///
    /// After the reply to a terminate request, the session is closed locally
    /// before returning.
    pub fn try_receive_response(&self) -> Result<Response, ClientError> {
        let session = self.current()?;

        let result = {
            let mut reader = session.reader.lock();
            receive_message(&mut *reader, &session.key, self.config.max_frame_size)
        }
        .and_then(|bytes| decode_response(&bytes).map_err(ChannelError::from));

        match result {
            Ok(response) => {
                if session.terminate_sent.load(Ordering::Acquire) {
                    debug!(name = %self.config.name, "terminate acknowledged, closing");
                    self.teardown(&session);
                }
                Ok(response)
            }
            Err(e) => {
                if e.is_authentication_failure() {
                    warn!(name = %self.config.name, peer = %session.peer_addr, "message failed authentication");
                }
                self.teardown(&session);
                Err(e.into())
            }
        }
    }

    /// Shut down and close the socket and discard the session key.
    ///
    /// Idempotent. A thread blocked in `receive_response` on this connection
    /// returns `None` promptly.
    pub fn disconnect(&self) {
        let taken = self.session.lock().take();
        if let Some(session) = taken {
            session.shutdown();
            info!(name = %self.config.name, peer = %session.peer_addr, "disconnected");
        }
    }

    /// Address of the connected peer.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.session.lock().as_ref().map(|s| s.peer_addr)
    }

    /// Client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn current(&self) -> Result<Arc<Session>, ClientError> {
        self.session.lock().clone().ok_or(ClientError::NotConnected)
    }

    /// Remove `session` if it is still the installed one, then shut it down.
    /// A session that was already replaced by a reconnect is left alone.
    fn teardown(&self, session: &Arc<Session>) {
        {
            let mut slot = self.session.lock();
            if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, session)) {
                *slot = None;
            }
        }
        session.shutdown();
    }

    fn open_stream(&self) -> Result<TcpStream, ClientError> {
        let target = format!("{}:{}", self.config.host, self.config.port);
        let addrs: Vec<SocketAddr> = (self.config.host.as_str(), self.config.port)
            .to_socket_addrs()
            .map_err(|e| ClientError::Resolve(format!("{target}: {e}")))?
            .collect();

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.config.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    debug!(%addr, error = %e, "connect attempt failed");
                    last_err = Some(e);
                }
            }
        }

        Err(match last_err {
            Some(e) => ClientError::Connect(e),
            None => ClientError::Resolve(target),
        })
    }

    /// Handshake on a freshly opened stream. The stream is shut down on
    /// every error path.
    fn establish(&self, mut stream: TcpStream) -> Result<Session, ClientError> {
        let key = match self.handshake(&mut stream) {
            Ok(key) => key,
            Err(e) => {
                let _ = stream.shutdown(Shutdown::Both);
                return Err(e);
            }
        };

        // On failure the stream is dropped here, which closes it.
        Session::new(stream, key).map_err(ClientError::Connect)
    }

    fn handshake(&self, stream: &mut TcpStream) -> Result<SessionKey, ClientError> {
        stream.set_nodelay(true).map_err(ClientError::Connect)?;
        stream
            .set_read_timeout(Some(self.config.handshake_timeout))
            .map_err(ClientError::Connect)?;
        stream
            .set_write_timeout(Some(self.config.handshake_timeout))
            .map_err(ClientError::Connect)?;

        let key = perform_handshake(stream, Role::Initiator)?;

        stream
            .set_read_timeout(self.config.read_timeout)
            .map_err(ClientError::Connect)?;
        stream.set_write_timeout(None).map_err(ClientError::Connect)?;

        Ok(key)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("name", &self.config.name)
            .field("connected", &self.is_connected())
            .finish()
    }
}
