//! Echo server: answers pings with their own payload.

use fenris_channel::message::{Request, RequestType, Response};
use fenris_channel::server::{Server, ServerBuilder};

/// Reply to one request.
pub fn respond(request: &Request) -> Response {
    match request.command {
        RequestType::Ping => Response::pong(request.data.clone()),
        RequestType::Terminate => Response::terminated(),
        other => Response::error(format!("unsupported command: {other:?}")),
    }
}

/// Bind and serve until the process is killed.
pub fn run(bind: &str, max_sessions: usize) -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerBuilder::new()
        .bind_addr(bind.parse()?)
        .max_sessions(max_sessions)
        .build();

    let server = Server::bind(config)?;
    tracing::info!("Echo server listening on {}", server.local_addr());

    server.serve(respond)?;
    Ok(())
}
