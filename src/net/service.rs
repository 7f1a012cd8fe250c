//! Request handlers for [`LineServer`](crate::net::LineServer).
//!
//! [`EchoService`] is the stock handler; custom services implement [`LineService`].

use async_trait::async_trait;

/// Maps one request line to one response line.
///
/// Called sequentially per connection (no pipelining), concurrently across
/// connections.
#[async_trait]
pub trait LineService: Send + Sync + 'static {
    /// Produces the response for `line` (terminator already stripped).
    async fn respond(&self, line: &str) -> String;

    /// Name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Answers every line with `"Received " + line`.
#[derive(Clone, Copy, Debug, Default)]
pub struct EchoService;

/// Prefix put in front of every echoed line.
pub const ECHO_PREFIX: &str = "Received ";

#[async_trait]
impl LineService for EchoService {
    async fn respond(&self, line: &str) -> String {
        format!("{ECHO_PREFIX}{line}")
    }

    fn name(&self) -> &'static str {
        "echo"
    }
}
