//! Blocking Fenris server.
//!
//! Accepts TCP clients, runs the responder side of the handshake, and hands
//! each client to a [`ServerSession`]. [`Server::serve`] drives one thread
//! per session; [`Server::accept`] is available for callers that want to
//! schedule sessions themselves.
//!
//! ```text
//!                 ┌──────────────┐  accept   ┌───────────────┐
//!   clients ────▶ │ TcpListener  │ ────────▶ │ ServerSession │ ──▶ handler
//!                 └──────────────┘           └───────────────┘
//!                        ▲                          ▲
//!                        └──── ServerHandle::stop ──┘
//!                           (wake accept, shut down live sockets)
//! ```

use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::session::{RequestHandler, ServerSession};
use crate::channel::ChannelError;
use crate::core::{ACCEPT_RETRY_DELAY, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_MAX_FRAME_SIZE};

/// Errors that can occur in the Fenris server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("bind failed: {0}")]
    Bind(io::Error),

    /// Failed to accept a connection.
    #[error("accept failed: {0}")]
    Accept(io::Error),

    /// Handshake with a new client failed.
    #[error("handshake failed: {0}")]
    Handshake(ChannelError),

    /// Message exchange on an established session failed.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Server has been stopped.
    #[error("server stopped")]
    Stopped,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,

    /// Largest inbound frame accepted.
    pub max_frame_size: usize,

    /// Read/write timeout applied while the handshake is in progress.
    pub handshake_timeout: Duration,

    /// Maximum number of concurrent sessions. Connections beyond this are
    /// closed right after accept.
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 7777)),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            max_sessions: 64,
        }
    }
}

/// Builder for creating a `ServerConfig`.
#[derive(Debug)]
pub struct ServerBuilder {
    config: ServerConfig,
}

impl ServerBuilder {
    /// Create a new server builder.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Set the bind address.
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    /// Set the largest inbound frame accepted.
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.config.max_frame_size = size;
        self
    }

    /// Set the handshake timeout.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Set the maximum number of concurrent sessions.
    pub fn max_sessions(mut self, max: usize) -> Self {
        self.config.max_sessions = max;
        self
    }

    /// Build the server configuration.
    pub fn build(self) -> ServerConfig {
        self.config
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared between the server, its handles and its sessions.
#[derive(Debug)]
pub(super) struct Shared {
    local_addr: SocketAddr,
    stopped: AtomicBool,
    next_id: AtomicU64,
    /// Control handle of every live session, keyed by session id. A slot is
    /// taken at accept time, before the handshake starts.
    sessions: Mutex<HashMap<u64, TcpStream>>,
}

impl Shared {
    pub(super) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Take a session slot unless `max` are already live.
    fn try_register(&self, id: u64, control: TcpStream, max: usize) -> bool {
        let mut sessions = self.sessions.lock();
        if sessions.len() >= max {
            return false;
        }
        sessions.insert(id, control);
        true
    }

    pub(super) fn unregister(&self, id: u64) {
        self.sessions.lock().remove(&id);
    }

    fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Address a loopback connect can reach the listener on.
    fn wake_addr(&self) -> SocketAddr {
        let ip = match self.local_addr.ip() {
            IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
            ip => ip,
        };
        SocketAddr::new(ip, self.local_addr.port())
    }
}

/// Handle for stopping a running server from another thread.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    shared: Arc<Shared>,
}

impl ServerHandle {
    /// Stop accepting and shut down every live session.
    ///
    /// A thread blocked in [`Server::accept`] or [`Server::serve`] returns,
    /// and every session blocked on a read sees its socket closed.
    /// Idempotent.
    pub fn stop(&self) {
        if self.shared.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        // Wake the blocked accept; the connection itself is discarded.
        if let Err(e) = TcpStream::connect_timeout(&self.shared.wake_addr(), Duration::from_secs(1)) {
            debug!(error = %e, "wake connect failed");
        }

        let sessions: Vec<(u64, TcpStream)> = self.shared.sessions.lock().drain().collect();
        for (id, control) in sessions {
            debug!(session = id, "shutting down session");
            let _ = control.shutdown(Shutdown::Both);
        }

        info!(addr = %self.shared.local_addr, "server stopped");
    }

    /// Whether [`ServerHandle::stop`] has been called.
    pub fn is_stopped(&self) -> bool {
        self.shared.is_stopped()
    }
}

/// A Fenris server bound to a TCP port.
///
/// # Example
///
/// ```no_run
/// use fenris_channel::message::{Request, Response};
/// use fenris_channel::server::{Server, ServerBuilder};
///
/// let config = ServerBuilder::new()
///     .bind_addr("127.0.0.1:7777".parse()?)
///     .build();
///
/// let server = Server::bind(config)?;
/// server.serve(|_request: &Request| Response::pong("PONG"))?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    shared: Arc<Shared>,
}

impl Server {
    /// Bind the listening socket.
    pub fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.bind_addr).map_err(ServerError::Bind)?;
        let local_addr = listener.local_addr().map_err(ServerError::Bind)?;

        info!(addr = %local_addr, "server listening");

        Ok(Self {
            listener,
            config,
            shared: Arc::new(Shared {
                local_addr,
                stopped: AtomicBool::new(false),
                next_id: AtomicU64::new(1),
                sessions: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Get the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.shared.local_addr
    }

    /// Get a handle that can stop this server.
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Get the number of live sessions.
    pub fn session_count(&self) -> usize {
        self.shared.session_count()
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Accept the next client and complete the handshake with it.
    ///
    /// # Errors
    /// [`ServerError::Stopped`] once the server is stopped,
    /// [`ServerError::Accept`] on listener failure, and
    /// [`ServerError::Handshake`] if this client's handshake failed.
    pub fn accept(&self) -> Result<ServerSession, ServerError> {
        let (stream, id) = self.accept_stream()?;
        ServerSession::establish(stream, id, &self.config, Arc::clone(&self.shared))
    }

    /// Accept clients until stopped, serving each on its own thread.
    ///
    /// Handshake failures and per-session errors are logged and do not end
    /// the loop. Returns `Ok(())` after [`ServerHandle::stop`].
    pub fn serve<H>(&self, handler: H) -> Result<(), ServerError>
    where
        H: RequestHandler + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);

        loop {
            let (stream, id) = match self.accept_stream() {
                Ok(accepted) => accepted,
                Err(ServerError::Stopped) => return Ok(()),
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    thread::sleep(ACCEPT_RETRY_DELAY);
                    continue;
                }
            };

            let config = self.config.clone();
            let shared = Arc::clone(&self.shared);
            let handler = Arc::clone(&handler);

            let spawned = thread::Builder::new()
                .name(format!("fenris-session-{id}"))
                .spawn(move || match ServerSession::establish(stream, id, &config, shared) {
                    Ok(session) => session.run(&*handler),
                    Err(e) => warn!(session = id, error = %e, "session setup failed"),
                });

            // The closure and its stream are gone; release the slot it held.
            if let Err(e) = spawned {
                warn!(session = id, error = %e, "cannot spawn session thread");
                self.shared.unregister(id);
                thread::sleep(ACCEPT_RETRY_DELAY);
            }
        }
    }

    /// Accept one TCP connection, enforcing the stop flag and session limit.
    ///
    /// The returned id already holds a slot in the session registry; it is
    /// released when the session built from it closes.
    fn accept_stream(&self) -> Result<(TcpStream, u64), ServerError> {
        loop {
            if self.shared.is_stopped() {
                return Err(ServerError::Stopped);
            }

            let (stream, peer) = self.listener.accept().map_err(ServerError::Accept)?;

            if self.shared.is_stopped() {
                return Err(ServerError::Stopped);
            }

            let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
            let control = stream.try_clone()?;
            if !self.shared.try_register(id, control, self.config.max_sessions) {
                warn!(%peer, max = self.config.max_sessions, "session limit reached, dropping connection");
                let _ = stream.shutdown(Shutdown::Both);
                continue;
            }

            info!(session = id, %peer, "accepted connection");
            return Ok((stream, id));
        }
    }
}
