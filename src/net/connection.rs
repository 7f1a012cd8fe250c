//! # One framed TCP connection and its ordered teardown.
//!
//! ```text
//! Connecting ──► Open ──► Closing ──► Closed
//!                  │         ▲
//!                  └─────────┘  EOF, close command, error or cancellation
//! ```
//!
//! Teardown runs on every exit path and always in this order:
//! 1. stop reading requests,
//! 2. flush pending writes,
//! 3. shut down the write half (peer sees EOF),
//! 4. wait for the peer's EOF, bounded by `close_timeout`.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::debug;

use crate::error::NetError;

/// Lifecycle of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Transport being established.
    Connecting,
    /// Exchanging lines.
    Open,
    /// Teardown in progress.
    Closing,
    /// Both directions closed.
    Closed,
}

impl ConnectionState {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Line-framed stream owned by exactly one handler (or client).
pub(crate) struct Connection {
    framed: Framed<TcpStream, LinesCodec>,
    peer: SocketAddr,
    state: ConnectionState,
    peer_eof: bool,
}

impl Connection {
    pub(crate) fn new(stream: TcpStream, peer: SocketAddr, codec: LinesCodec) -> Self {
        Self {
            framed: Framed::new(stream, codec),
            peer,
            state: ConnectionState::Open,
            peer_eof: false,
        }
    }

    pub(crate) fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.state
    }

    /// Reads the next line; `Ok(None)` is the peer's EOF.
    ///
    /// Cancel safe: a partially received line stays buffered in the codec.
    pub(crate) async fn read_line(&mut self) -> Result<Option<String>, NetError> {
        match self.framed.next().await {
            Some(Ok(line)) => Ok(Some(line)),
            Some(Err(e)) => Err(e.into()),
            None => {
                self.peer_eof = true;
                Ok(None)
            }
        }
    }

    /// Writes one line (terminator appended) and flushes it.
    pub(crate) async fn write_line(&mut self, line: &str) -> Result<(), NetError> {
        self.framed.send(line).await?;
        Ok(())
    }

    /// Runs the ordered teardown; idempotent.
    ///
    /// Errors while closing are logged and swallowed: the connection ends
    /// `Closed` regardless.
    pub(crate) async fn teardown(&mut self, close_timeout: Duration) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.state = ConnectionState::Closing;

        if let Err(e) = SinkExt::<&str>::flush(&mut self.framed).await {
            debug!(peer = %self.peer, error = %e, "flush during teardown failed");
        }
        if let Err(e) = self.framed.get_mut().shutdown().await {
            debug!(peer = %self.peer, error = %e, "write shutdown failed");
        }
        if !self.peer_eof {
            let drain = async {
                // Late lines from the peer are discarded; only its EOF matters.
                while let Some(frame) = self.framed.next().await {
                    if frame.is_err() {
                        break;
                    }
                }
            };
            if tokio::time::timeout(close_timeout, drain).await.is_err() {
                debug!(peer = %self.peer, ?close_timeout, "peer did not close in time");
            }
            self.peer_eof = true;
        }
        self.state = ConnectionState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn teardown_shuts_write_half_and_waits_for_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let peer = tokio::spawn(async move {
            let mut raw = TcpStream::connect(addr).await.unwrap();
            let mut buf = Vec::new();
            raw.read_to_end(&mut buf).await.unwrap();
            raw.shutdown().await.unwrap();
            String::from_utf8(buf).unwrap()
        });

        let (stream, peer_addr) = listener.accept().await.unwrap();
        let mut conn = Connection::new(stream, peer_addr, LinesCodec::new());
        conn.write_line("bye").await.unwrap();
        conn.teardown(Duration::from_secs(1)).await;

        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(peer.await.unwrap(), "bye\n");
        conn.teardown(Duration::from_secs(1)).await;
    }
}
