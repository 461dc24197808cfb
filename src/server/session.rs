//! Server-side session.
//!
//! One `ServerSession` per accepted client: the responder end of a
//! [`SecureChannel`] plus its registration with the owning server, so that
//! [`ServerHandle::stop`](super::ServerHandle::stop) can shut it down.

use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::server::{ServerConfig, ServerError, Shared};
use crate::channel::{ChannelError, Role, SecureChannel};
use crate::message::{decode_request, encode_response, Request, Response};

/// Produces a response for each request a session receives.
///
/// Implemented for any `Fn(&Request) -> Response`.
pub trait RequestHandler {
    /// Handle one request.
    fn handle(&self, request: &Request) -> Response;
}

impl<F> RequestHandler for F
where
    F: Fn(&Request) -> Response,
{
    fn handle(&self, request: &Request) -> Response {
        self(request)
    }
}

/// An established session with one client.
#[derive(Debug)]
pub struct ServerSession {
    id: u64,
    peer_addr: SocketAddr,
    channel: SecureChannel<TcpStream>,
    shared: Arc<Shared>,
    closed: bool,
}

impl ServerSession {
    /// Run the responder handshake on a stream whose registry slot `id` was
    /// taken at accept time. The slot is released on every error path.
    pub(super) fn establish(
        stream: TcpStream,
        id: u64,
        config: &ServerConfig,
        shared: Arc<Shared>,
    ) -> Result<Self, ServerError> {
        let peer_addr = match stream.peer_addr() {
            Ok(addr) => addr,
            Err(e) => {
                let _ = stream.shutdown(Shutdown::Both);
                shared.unregister(id);
                return Err(e.into());
            }
        };

        // From here on, dropping `session` closes it and frees the slot.
        let mut session = Self {
            id,
            peer_addr,
            channel: SecureChannel::new(stream, Role::Responder, config.max_frame_size),
            shared,
            closed: false,
        };

        let stream = session.channel.get_ref();
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(config.handshake_timeout))?;
        stream.set_write_timeout(Some(config.handshake_timeout))?;

        // A stop that drained the registry before this slot was taken.
        if session.shared.is_stopped() {
            session.close();
            return Err(ServerError::Stopped);
        }

        if let Err(e) = session.channel.handshake() {
            warn!(session = id, peer = %peer_addr, error = %e, "handshake failed");
            session.close();
            return Err(ServerError::Handshake(e));
        }

        let stream = session.channel.get_ref();
        stream.set_read_timeout(None)?;
        stream.set_write_timeout(None)?;

        info!(session = id, peer = %peer_addr, "session established");
        Ok(session)
    }

    /// Receive and decode the next request.
    ///
    /// Any failure closes the session.
    pub fn receive_request(&mut self) -> Result<Request, ServerError> {
        let result = self
            .channel
            .receive()
            .and_then(|bytes| decode_request(&bytes).map_err(ChannelError::from));

        match result {
            Ok(request) => {
                debug!(session = self.id, command = ?request.command, "request received");
                Ok(request)
            }
            Err(e) => {
                self.close();
                Err(e.into())
            }
        }
    }

    /// Encode and send a response.
    ///
    /// Any failure closes the session.
    pub fn send_response(&mut self, response: &Response) -> Result<(), ServerError> {
        let result = encode_response(response)
            .map_err(ChannelError::from)
            .and_then(|payload| self.channel.send(&payload));

        if let Err(e) = result {
            self.close();
            return Err(e.into());
        }
        Ok(())
    }

    /// Serve requests until the client terminates or the connection fails.
    ///
    /// A `Terminate` request is answered first and then the session closes
    /// its side.
    pub fn run<H: RequestHandler + ?Sized>(mut self, handler: &H) {
        loop {
            let request = match self.receive_request() {
                Ok(request) => request,
                Err(ServerError::Channel(ChannelError::Disconnected)) => {
                    debug!(session = self.id, "client disconnected");
                    break;
                }
                Err(e) => {
                    warn!(session = self.id, error = %e, "receive failed");
                    break;
                }
            };

            let response = handler.handle(&request);
            if let Err(e) = self.send_response(&response) {
                warn!(session = self.id, error = %e, "send failed");
                break;
            }

            if request.is_terminate() {
                debug!(session = self.id, "terminate handled, closing");
                break;
            }
        }

        self.close();
    }

    /// Shut down the socket, discard the session key and leave the server's
    /// registry. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        self.channel.close();
        let _ = self.channel.get_ref().shutdown(Shutdown::Both);
        self.shared.unregister(self.id);
        info!(session = self.id, peer = %self.peer_addr, "session closed");
    }

    /// Server-assigned session id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Address of the client.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Whether the session can still exchange messages.
    pub fn is_open(&self) -> bool {
        !self.closed && self.channel.is_established()
    }
}

impl Drop for ServerSession {
    fn drop(&mut self) {
        self.close();
    }
}
