//! # LineClient: one request line out, one response line back.
//!
//! Requests never overlap: [`LineClient::request`] takes `&mut self` and returns
//! only once the matching response line was read, so responses cannot be
//! attributed to the wrong request.

use std::io;
use std::net::SocketAddr;

use tokio::net::{TcpStream, ToSocketAddrs, lookup_host};
use tracing::debug;

use crate::error::NetError;
use crate::net::config::NetConfig;
use crate::net::connection::{Connection, ConnectionState};

/// Line-protocol client: one request line, one response line.
///
/// # Example
/// ```no_run
/// use tasklane::net::LineClient;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), tasklane::NetError> {
/// let mut client = LineClient::connect("127.0.0.1:8888").await?;
/// let reply = client.request("ping").await?;
/// assert_eq!(reply, "Received ping");
/// client.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct LineClient {
    conn: Connection,
    local: SocketAddr,
    cfg: NetConfig,
}

impl LineClient {
    /// Connects with default settings.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, NetError> {
        Self::connect_with(addr, NetConfig::default()).await
    }

    /// Connects to the first resolved address that accepts.
    ///
    /// No listener yields [`NetError::ConnectionRefused`]; nothing is retried.
    pub async fn connect_with<A: ToSocketAddrs>(addr: A, cfg: NetConfig) -> Result<Self, NetError> {
        let mut last_err = None;
        for target in lookup_host(addr).await? {
            debug!(%target, state = %ConnectionState::Connecting, "connecting");
            match TcpStream::connect(target).await {
                Ok(stream) => {
                    let local = stream.local_addr()?;
                    let conn = Connection::new(stream, target, cfg.codec());
                    return Ok(Self { conn, local, cfg });
                }
                Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                    last_err = Some(NetError::ConnectionRefused { addr: target });
                }
                Err(e) => last_err = Some(e.into()),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            NetError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "address resolved to nothing",
            ))
        }))
    }

    /// Server address.
    pub fn peer(&self) -> SocketAddr {
        self.conn.peer()
    }

    /// Local address of this client (the peer address the server sees).
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.conn.state()
    }

    /// Sends `line` and waits for the matching response line.
    ///
    /// A line containing `\n` or `\r` would reach the server as several
    /// requests; it is rejected with [`NetError::InvalidRequest`] and the
    /// connection stays `Open`. EOF before a response is
    /// [`NetError::ConnectionReset`]; the client is torn down in that case.
    pub async fn request(&mut self, line: &str) -> Result<String, NetError> {
        if self.conn.state() != ConnectionState::Open {
            return Err(NetError::Io(io::Error::from(io::ErrorKind::NotConnected)));
        }
        if line.contains(['\n', '\r']) {
            return Err(NetError::InvalidRequest {
                reason: "line terminator inside request",
            });
        }
        let res = self.exchange(line).await;
        if res.is_err() {
            self.conn.teardown(self.cfg.close_timeout).await;
        }
        res
    }

    async fn exchange(&mut self, line: &str) -> Result<String, NetError> {
        self.conn.write_line(line).await?;
        self.conn.read_line().await?.ok_or(NetError::ConnectionReset)
    }

    /// Sends the close command and tears the connection down.
    ///
    /// Idempotent; the client is `Closed` afterwards even if sending failed.
    pub async fn close(&mut self) -> Result<(), NetError> {
        if self.conn.state() != ConnectionState::Open {
            return Ok(());
        }
        let command = self.cfg.close_command.clone();
        let sent = self.conn.write_line(&command).await;
        self.conn.teardown(self.cfg.close_timeout).await;
        debug!(peer = %self.conn.peer(), "client closed");
        sent
    }
}
