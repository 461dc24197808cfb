//! Fenris echo demo.
//!
//! # Usage
//!
//! ```bash
//! # Answer pings on port 7777
//! fenris-echo server --bind 127.0.0.1:7777
//!
//! # Send three pings, then terminate
//! fenris-echo client --host 127.0.0.1 --port 7777 --message hello --count 3
//! ```

mod client;
mod server;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Fenris secure channel echo demo
#[derive(Parser, Debug)]
#[command(name = "fenris-echo")]
#[command(about = "Echo server and client over the Fenris secure channel")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Run the echo server
    Server {
        /// Address to bind to
        #[arg(short, long, default_value = "127.0.0.1:7777")]
        bind: String,

        /// Maximum concurrent sessions
        #[arg(long, default_value = "64")]
        max_sessions: usize,
    },

    /// Ping a running server
    Client {
        /// Server host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Server port
        #[arg(short, long, default_value = "7777")]
        port: u16,

        /// Ping payload
        #[arg(short, long, default_value = "PING")]
        message: String,

        /// Number of pings to send
        #[arg(short, long, default_value = "1")]
        count: u32,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    match args.mode {
        Mode::Server { bind, max_sessions } => server::run(&bind, max_sessions),
        Mode::Client {
            host,
            port,
            message,
            count,
        } => client::run(host, port, &message, count),
    }
}
