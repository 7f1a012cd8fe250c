//! # Example: echo_client
//!
//! Sends each argument as one line to an echo server, prints the responses and
//! closes the session with `exit`.
//!
//! ## Run
//! ```bash
//! cargo run --example echo_server &
//! cargo run --example echo_client -- 127.0.0.1:8888 ping "hello there"
//! ```

use tasklane::net::LineClient;
use tasklane::{NetError, init_tracing};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let addr = args.next().unwrap_or_else(|| "127.0.0.1:8888".to_string());
    let mut lines: Vec<String> = args.collect();
    if lines.is_empty() {
        lines.push("ping".to_string());
    }

    let mut client = match LineClient::connect(addr.as_str()).await {
        Ok(c) => c,
        Err(NetError::ConnectionRefused { addr }) => {
            eprintln!("[client] nobody listening on {addr}");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    println!("[client] connected to {}", client.peer());

    for line in &lines {
        let reply = client.request(line).await?;
        println!("[client] {line:?} -> {reply:?}");
    }

    client.close().await?;
    println!("[client] state: {}", client.state());
    Ok(())
}
