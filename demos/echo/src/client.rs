//! Echo client: send pings, print replies, then terminate.

use fenris_channel::client::{ConnectionManager, ConnectionManagerBuilder};
use fenris_channel::message::Request;

/// Connect, ping `count` times and end the session.
pub fn run(host: String, port: u16, message: &str, count: u32) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConnectionManagerBuilder::new()
        .host(host)
        .port(port)
        .name("fenris-echo")
        .build();
    let manager = ConnectionManager::new(config);

    manager.try_connect()?;

    for seq in 1..=count {
        manager.try_send_request(&Request::ping(message))?;
        let response = manager.try_receive_response()?;
        println!(
            "[{seq}] {:?}: {}",
            response.response_type,
            String::from_utf8_lossy(&response.data)
        );
    }

    manager.try_send_request(&Request::terminate())?;
    let bye = manager.try_receive_response()?;
    tracing::info!(response = ?bye.response_type, connected = manager.is_connected(), "session ended");

    Ok(())
}
