//! # LineServer: accept loop with one handler task per connection.
//!
//! ```text
//! serve(shutdown)
//!   loop select! {
//!     shutdown fired      → stop accepting
//!     accept() → (tcp)    → JoinSet.spawn(handle(conn, shutdown.child_token()))
//!     handler finished    → log its result
//!   }
//!   drop listener, wait for handlers (each runs its own teardown)
//!
//! handle(conn)
//!   loop { read line ─► EOF / close command / cancel → break
//!                    └► respond ─► write + flush }
//!   teardown (always)
//! ```
//!
//! ## Rules
//! - A handler owns its connection exclusively; errors stay on that connection.
//! - Every handler runs on a child of the shutdown token, registered in the
//!   server's [`ConnectionSet`] so one connection can be cancelled on its own.
//! - Request/response strictly alternate: the next line is read only after the
//!   previous response was flushed.
//! - The close command ends the session without a response.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::NetError;
use crate::net::config::NetConfig;
use crate::net::connection::Connection;
use crate::net::service::LineService;

/// Pause after a failed `accept` (e.g. out of file descriptors).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Line-protocol TCP server.
///
/// # Example
/// ```no_run
/// use tokio_util::sync::CancellationToken;
/// use tasklane::net::{EchoService, LineServer, NetConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), tasklane::NetError> {
/// let server = LineServer::bind("127.0.0.1:8888", NetConfig::default(), EchoService).await?;
/// let shutdown = CancellationToken::new();
/// server.serve(shutdown).await
/// # }
/// ```
pub struct LineServer<S> {
    listener: TcpListener,
    cfg: NetConfig,
    service: Arc<S>,
    conns: ConnectionSet,
}

/// Open connections of one [`LineServer`], keyed by peer address.
///
/// Cheap to clone; take it with [`LineServer::connections`] before calling
/// `serve`. Cancelling a peer tears down that connection only.
#[derive(Clone, Debug, Default)]
pub struct ConnectionSet {
    tokens: Arc<Mutex<HashMap<SocketAddr, CancellationToken>>>,
}

impl ConnectionSet {
    fn lock(&self) -> MutexGuard<'_, HashMap<SocketAddr, CancellationToken>> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sorted peer addresses of connections whose handler is still running.
    pub fn peers(&self) -> Vec<SocketAddr> {
        let mut peers: Vec<SocketAddr> = self.lock().keys().copied().collect();
        peers.sort_unstable();
        peers
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Cancels the handler serving `peer`; `false` if no such connection is open.
    pub fn cancel(&self, peer: &SocketAddr) -> bool {
        match self.lock().get(peer) {
            Some(token) => {
                debug!(%peer, "connection cancel requested");
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn track(&self, peer: SocketAddr, token: CancellationToken) -> Tracked {
        self.lock().insert(peer, token);
        Tracked {
            set: self.clone(),
            peer,
        }
    }
}

/// Removes its peer from the set when the handler ends (or is aborted).
struct Tracked {
    set: ConnectionSet,
    peer: SocketAddr,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.set.lock().remove(&self.peer);
    }
}

impl<S: LineService> LineServer<S> {
    /// Binds the listening socket.
    pub async fn bind<A: ToSocketAddrs>(addr: A, cfg: NetConfig, service: S) -> Result<Self, NetError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            cfg,
            service: Arc::new(service),
            conns: ConnectionSet::default(),
        })
    }

    /// Handle on the open connections, usable while `serve` runs.
    pub fn connections(&self) -> ConnectionSet {
        self.conns.clone()
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until `shutdown` fires, then tears every connection down.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<(), NetError> {
        let local = self.local_addr()?;
        info!(addr = %local, service = self.service.name(), "listening");

        let mut handlers: JoinSet<(SocketAddr, Result<(), NetError>)> = JoinSet::new();
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                Some(joined) = handlers.join_next(), if !handlers.is_empty() => report(joined),
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        info!(%peer, "connection accepted");
                        let conn = Connection::new(stream, peer, self.cfg.codec());
                        let cfg = self.cfg.clone();
                        let service = Arc::clone(&self.service);
                        let token = shutdown.child_token();
                        let tracked = self.conns.track(peer, token.clone());
                        handlers.spawn(async move {
                            let _tracked = tracked;
                            let res = handle_connection(conn, service.as_ref(), &cfg, &token).await;
                            (peer, res)
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }

        drop(self.listener);
        info!(addr = %local, open = handlers.len(), "stopped accepting; closing connections");
        // Each handler bounds its own teardown by close_timeout.
        let drain = async {
            while let Some(joined) = handlers.join_next().await {
                report(joined);
            }
        };
        let budget = self.cfg.close_timeout.saturating_mul(2);
        if tokio::time::timeout(budget, drain).await.is_err() {
            warn!(remaining = handlers.len(), "connections did not close in time; aborting");
            handlers.shutdown().await;
        }
        Ok(())
    }
}

/// Read-respond loop for one connection; teardown runs on every exit path.
async fn handle_connection<S: LineService + ?Sized>(
    mut conn: Connection,
    service: &S,
    cfg: &NetConfig,
    token: &CancellationToken,
) -> Result<(), NetError> {
    let res = exchange(&mut conn, service, cfg, token).await;
    conn.teardown(cfg.close_timeout).await;
    debug!(peer = %conn.peer(), state = %conn.state(), "connection finished");
    res
}

async fn exchange<S: LineService + ?Sized>(
    conn: &mut Connection,
    service: &S,
    cfg: &NetConfig,
    token: &CancellationToken,
) -> Result<(), NetError> {
    loop {
        let line = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(()),
            line = conn.read_line() => line?,
        };
        let Some(line) = line else {
            debug!(peer = %conn.peer(), "peer closed");
            return Ok(());
        };
        if cfg.is_close_command(&line) {
            debug!(peer = %conn.peer(), "close command received");
            return Ok(());
        }
        let reply = service.respond(&line).await;
        conn.write_line(&reply).await?;
    }
}

fn report(joined: Result<(SocketAddr, Result<(), NetError>), tokio::task::JoinError>) {
    match joined {
        Ok((peer, Ok(()))) => info!(%peer, "connection closed"),
        Ok((peer, Err(e))) => warn!(%peer, error = %e, kind = e.as_label(), "connection failed"),
        Err(e) => warn!(error = %e, "connection handler panicked"),
    }
}
