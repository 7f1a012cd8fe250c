//! # NetConfig: knobs shared by both ends of the line protocol.
//!
//! The same config builds the codec on the server and on the client, so both
//! agree on the maximum line length and on the close command.

use std::time::Duration;

use tokio_util::codec::LinesCodec;

/// Settings shared by [`LineServer`](crate::net::LineServer) and
/// [`LineClient`](crate::net::LineClient).
///
/// ## Field semantics
/// - `max_line_length`: longest accepted line in bytes, terminator excluded
/// - `close_timeout`: how long teardown waits for the peer's EOF after shutting
///   down the write half
/// - `close_command`: line that ends a session (compared case-insensitively after trimming)
#[derive(Clone, Debug)]
pub struct NetConfig {
    /// Maximum line length accepted by the codec.
    pub max_line_length: usize,
    /// Bound on the wait for the peer's close acknowledgement.
    pub close_timeout: Duration,
    /// Session-ending command.
    pub close_command: String,
}

impl NetConfig {
    /// Builds the line codec used on both ends.
    pub fn codec(&self) -> LinesCodec {
        LinesCodec::new_with_max_length(self.max_line_length.max(1))
    }

    /// True if `line` is the close command.
    pub fn is_close_command(&self, line: &str) -> bool {
        line.trim().eq_ignore_ascii_case(self.close_command.trim())
    }
}

impl Default for NetConfig {
    /// - `max_line_length = 8 KiB`
    /// - `close_timeout = 2s`
    /// - `close_command = "exit"`
    fn default() -> Self {
        Self {
            max_line_length: 8 * 1024,
            close_timeout: Duration::from_secs(2),
            close_command: "exit".to_string(),
        }
    }
}
