//! Integration tests for the client connection manager.
//!
//! Every test talks to a real server over loopback TCP. `MockServer` records
//! the requests it receives and answers each with the next queued response
//! (a `PONG` once the queue is empty).

use std::collections::VecDeque;
use std::io::Write;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use fenris_channel::channel::{perform_handshake, receive_message, seal, Role};
use fenris_channel::client::{ClientError, ConnectionManager, ConnectionManagerBuilder};
use fenris_channel::core::DEFAULT_MAX_FRAME_SIZE;
use fenris_channel::message::{decode_request, encode_response, Request, RequestType, Response, ResponseType};
use fenris_channel::server::{Server, ServerBuilder, ServerHandle};
use fenris_channel::transport::write_frame;
use parking_lot::Mutex;

/// How long a blocked receive may take to notice a disconnect.
const UNBLOCK_DEADLINE: Duration = Duration::from_secs(5);

struct MockServer {
    addr: SocketAddr,
    handle: ServerHandle,
    received: Arc<Mutex<Vec<Request>>>,
    next_responses: Arc<Mutex<VecDeque<Response>>>,
    worker: Option<JoinHandle<()>>,
}

impl MockServer {
    fn start() -> Self {
        let config = ServerBuilder::new()
            .bind_addr(SocketAddr::from(([127, 0, 0, 1], 0)))
            .build();
        let server = Server::bind(config).unwrap();
        let addr = server.local_addr();
        let handle = server.handle();

        let received = Arc::new(Mutex::new(Vec::new()));
        let next_responses = Arc::new(Mutex::new(VecDeque::new()));

        let handler = {
            let received = Arc::clone(&received);
            let next_responses = Arc::clone(&next_responses);
            move |request: &Request| {
                received.lock().push(request.clone());
                next_responses.lock().pop_front().unwrap_or_else(|| Response::pong("PONG"))
            }
        };

        let worker = thread::spawn(move || server.serve(handler).unwrap());

        Self {
            addr,
            handle,
            received,
            next_responses,
            worker: Some(worker),
        }
    }

    fn port(&self) -> u16 {
        self.addr.port()
    }

    fn received_requests(&self) -> Vec<Request> {
        self.received.lock().clone()
    }

    fn set_next_response(&self, response: Response) {
        self.next_responses.lock().push_back(response);
    }

    fn stop(&mut self) {
        self.handle.stop();
        if let Some(worker) = self.worker.take() {
            worker.join().unwrap();
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn manager_for(port: u16) -> ConnectionManager {
    let config = ConnectionManagerBuilder::new()
        .host("127.0.0.1")
        .port(port)
        .name("test-client")
        .handshake_timeout(Duration::from_secs(2))
        .build();
    ConnectionManager::new(config)
}

/// Run `receive_response` on another thread so the test can act while it blocks.
fn spawn_receive(manager: &Arc<ConnectionManager>) -> JoinHandle<(Option<Response>, Duration)> {
    let manager = Arc::clone(manager);
    thread::spawn(move || {
        let start = Instant::now();
        let response = manager.receive_response();
        (response, start.elapsed())
    })
}

#[test]
fn test_connect_and_disconnect() {
    let server = MockServer::start();
    let manager = manager_for(server.port());

    assert!(!manager.is_connected());
    assert!(manager.connect());
    assert!(manager.is_connected());

    manager.disconnect();
    assert!(!manager.is_connected());
}

#[test]
fn test_connection_failure() {
    let mut server = MockServer::start();
    let port = server.port();
    server.stop();

    let manager = manager_for(port);
    assert!(!manager.connect());
    assert!(!manager.is_connected());
}

#[test]
fn test_unresolvable_host() {
    let config = ConnectionManagerBuilder::new().host("host.invalid").port(1).build();
    let manager = ConnectionManager::new(config);

    assert!(matches!(manager.try_connect(), Err(ClientError::Resolve(_))));
    assert!(!manager.is_connected());
}

#[test]
fn test_send_request() {
    let server = MockServer::start();
    let manager = manager_for(server.port());
    assert!(manager.connect());

    let request = Request::ping("TestPing");
    assert!(manager.send_request(&request));
    assert!(manager.receive_response().is_some());

    assert_eq!(server.received_requests(), vec![request]);
}

#[test]
fn test_receive_response() {
    let server = MockServer::start();
    let manager = manager_for(server.port());
    assert!(manager.connect());

    let expected = Response::new(true, ResponseType::Pong, "Pong");
    server.set_next_response(expected.clone());

    assert!(manager.send_request(&Request::ping("Ping")));
    assert_eq!(manager.receive_response(), Some(expected));
    assert!(manager.is_connected());
}

#[test]
fn test_send_and_receive_multiple() {
    let server = MockServer::start();
    let manager = manager_for(server.port());
    assert!(manager.connect());

    let ping = Request::ping("Ping1");
    let pong = Response::pong("Pong1");
    server.set_next_response(pong.clone());
    assert!(manager.send_request(&ping));
    assert_eq!(manager.receive_response(), Some(pong));

    let read = Request::new(RequestType::ReadFile).with_filename("test.txt");
    let content = Response::new(true, ResponseType::FileContent, "File data");
    server.set_next_response(content.clone());
    assert!(manager.send_request(&read));
    assert_eq!(manager.receive_response(), Some(content));

    assert_eq!(server.received_requests(), vec![ping, read]);
}

#[test]
fn test_pipelined_requests() {
    let server = MockServer::start();
    let manager = manager_for(server.port());
    assert!(manager.connect());

    let first = Response::pong("Pong1");
    let second = Response::pong("Pong2");
    server.set_next_response(first.clone());
    server.set_next_response(second.clone());

    // Both requests go out before either reply is read.
    let a = Request::ping("A");
    let b = Request::ping("B");
    assert!(manager.send_request(&a));
    assert!(manager.send_request(&b));

    assert_eq!(manager.receive_response(), Some(first));
    assert_eq!(manager.receive_response(), Some(second));
    assert!(manager.is_connected());
    assert_eq!(server.received_requests(), vec![a, b]);
}

#[test]
fn test_reconnect_after_disconnect() {
    let server = MockServer::start();
    let manager = manager_for(server.port());

    for round in 0..3 {
        assert!(manager.connect(), "connect round {round}");
        assert!(manager.send_request(&Request::ping(format!("round {round}"))));
        assert!(manager.receive_response().is_some());
        manager.disconnect();
    }

    assert_eq!(server.received_requests().len(), 3);
}

#[test]
fn test_terminate_closes_connection() {
    let server = MockServer::start();
    let manager = manager_for(server.port());
    assert!(manager.connect());

    server.set_next_response(Response::terminated());
    assert!(manager.send_request(&Request::terminate()));

    let response = manager.receive_response().unwrap();
    assert_eq!(response.response_type, ResponseType::Terminated);
    assert!(!manager.is_connected());

    // The server has closed its side too; a new session still works.
    assert!(manager.connect());
    assert!(manager.send_request(&Request::ping("again")));
    assert!(manager.receive_response().is_some());
}

#[test]
fn test_terminate_reply_closes_waiting_receiver() {
    let server = MockServer::start();
    let manager = Arc::new(manager_for(server.port()));
    assert!(manager.connect());

    // The receiver is already blocked when the terminate goes out, so the
    // reply can land before the sender returns.
    let receiver = spawn_receive(&manager);
    thread::sleep(Duration::from_millis(50));

    server.set_next_response(Response::terminated());
    assert!(manager.send_request(&Request::terminate()));

    let (response, elapsed) = receiver.join().unwrap();
    assert_eq!(response.map(|r| r.response_type), Some(ResponseType::Terminated));
    assert!(elapsed < UNBLOCK_DEADLINE);
    assert!(!manager.is_connected());
}

#[test]
fn test_disconnect_unblocks_receive() {
    let server = MockServer::start();
    let manager = Arc::new(manager_for(server.port()));
    assert!(manager.connect());

    // No request sent, so the server never answers and the receive blocks.
    let receiver = spawn_receive(&manager);
    thread::sleep(Duration::from_millis(100));

    manager.disconnect();

    let (response, elapsed) = receiver.join().unwrap();
    assert!(response.is_none());
    assert!(elapsed < UNBLOCK_DEADLINE, "receive took {elapsed:?} to unblock");
    assert!(!manager.is_connected());
}

#[test]
fn test_concurrent_state_queries_during_disconnect() {
    let server = MockServer::start();
    let manager = Arc::new(manager_for(server.port()));
    assert!(manager.connect());

    let receiver = spawn_receive(&manager);
    let observers: Vec<_> = (0..4)
        .map(|_| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                for _ in 0..1000 {
                    let _ = manager.is_connected();
                }
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(20));
    manager.disconnect();
    manager.disconnect();

    for observer in observers {
        observer.join().unwrap();
    }
    assert!(receiver.join().unwrap().0.is_none());
    assert!(!manager.is_connected());
}

#[test]
fn test_server_stop_disconnects_client() {
    let mut server = MockServer::start();
    let manager = Arc::new(manager_for(server.port()));
    assert!(manager.connect());

    let receiver = spawn_receive(&manager);
    thread::sleep(Duration::from_millis(100));
    server.stop();

    let (response, elapsed) = receiver.join().unwrap();
    assert!(response.is_none());
    assert!(elapsed < UNBLOCK_DEADLINE);
    assert!(!manager.is_connected());
    assert!(!manager.send_request(&Request::ping("late")));
}

/// Raw peer: handshake, read one request, then send `reply` verbatim as a frame.
fn raw_peer(reply: impl FnOnce(&[u8]) -> Vec<u8> + Send + 'static) -> (u16, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let key = perform_handshake(&mut stream, Role::Responder).unwrap();
        let request = receive_message(&mut stream, &key, DEFAULT_MAX_FRAME_SIZE).unwrap();
        assert_eq!(decode_request(&request).unwrap().command, RequestType::Ping);

        let response = encode_response(&Response::pong("PONG")).unwrap();
        let sealed = seal(&key, &response).unwrap();
        write_frame(&mut stream, &reply(&sealed)).unwrap();

        // Hold the socket until the client hangs up.
        let _ = receive_message(&mut stream, &key, DEFAULT_MAX_FRAME_SIZE);
    });

    (port, handle)
}

#[test]
fn test_tampered_response_disconnects() {
    let (port, peer) = raw_peer(|sealed| {
        let mut tampered = sealed.to_vec();
        let last = tampered.len() - 1;
        tampered[last] ^= 0x01;
        tampered
    });

    let manager = manager_for(port);
    assert!(manager.connect());
    assert!(manager.send_request(&Request::ping("x")));

    match manager.try_receive_response() {
        Err(ClientError::Channel(e)) => assert!(e.is_authentication_failure()),
        other => panic!("expected authentication failure, got {other:?}"),
    }
    assert!(!manager.is_connected());
    peer.join().unwrap();
}

#[test]
fn test_untampered_raw_response_accepted() {
    let (port, peer) = raw_peer(|sealed| sealed.to_vec());

    let manager = manager_for(port);
    assert!(manager.connect());
    assert!(manager.send_request(&Request::ping("x")));
    assert_eq!(manager.receive_response(), Some(Response::pong("PONG")));

    manager.disconnect();
    peer.join().unwrap();
}

#[test]
fn test_oversized_frame_disconnects() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let peer = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let key = perform_handshake(&mut stream, Role::Responder).unwrap();
        let _ = receive_message(&mut stream, &key, DEFAULT_MAX_FRAME_SIZE).unwrap();

        // Advertise a frame larger than the client accepts; send no body.
        stream.write_all(&(1u32 << 20).to_be_bytes()).unwrap();
        let _ = receive_message(&mut stream, &key, DEFAULT_MAX_FRAME_SIZE);
    });

    let config = ConnectionManagerBuilder::new()
        .port(port)
        .max_frame_size(64 * 1024)
        .build();
    let manager = ConnectionManager::new(config);
    assert!(manager.connect());
    assert!(manager.send_request(&Request::ping("x")));

    assert!(manager.receive_response().is_none());
    assert!(!manager.is_connected());
    peer.join().unwrap();
}
