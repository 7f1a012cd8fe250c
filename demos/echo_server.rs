//! # Example: echo_server
//!
//! Line echo server: every request line `X` is answered with `Received X`,
//! `exit` closes the session. Stops on Ctrl-C / SIGTERM.
//!
//! ## Flow
//! ```text
//! LineServer::bind(addr) ──► serve(token)
//!     ├─► accept ──► handler task per connection
//!     │                 └─► read line ─► "Received {line}" ─► flush
//!     └─► signal ──► token.cancel() ──► handlers tear down ──► exit
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example echo_server -- 127.0.0.1:8888
//! ```

use tokio_util::sync::CancellationToken;

use tasklane::net::{EchoService, LineServer, NetConfig};
use tasklane::{init_tracing, wait_for_shutdown_signal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let addr = std::env::args().nth(1).unwrap_or_else(|| "127.0.0.1:8888".to_string());
    let server = LineServer::bind(addr.as_str(), NetConfig::default(), EchoService).await?;
    println!("[server] listening on {}", server.local_addr()?);

    let shutdown = CancellationToken::new();
    let stop = shutdown.clone();
    tokio::spawn(async move {
        if wait_for_shutdown_signal().await.is_ok() {
            println!("[server] signal received, stopping");
        }
        stop.cancel();
    });

    server.serve(shutdown).await?;
    println!("[server] bye");
    Ok(())
}
