//! # Line-oriented TCP endpoint.
//!
//! Messages are UTF-8 lines terminated by `\n`, framed with
//! [`LinesCodec`](tokio_util::codec::LinesCodec) so lines are reassembled across TCP
//! segmentation. The server answers each request line with one response line
//! before reading the next.
//!
//! - [`LineServer`]: accept loop, one handler task and child token per connection
//! - [`ConnectionSet`]: open connections of a server, cancellable one by one
//! - [`LineClient`]: request/response client with an orderly `close`
//! - [`LineService`], [`EchoService`]: request → response mapping
//! - [`ConnectionState`]: `Connecting → Open → Closing → Closed`
//! - [`NetConfig`]: line limit, close timeout and close command

mod client;
mod config;
mod connection;
mod server;
mod service;

pub use client::LineClient;
pub use config::NetConfig;
pub use connection::ConnectionState;
pub use server::{ConnectionSet, LineServer};
pub use service::{ECHO_PREFIX, EchoService, LineService};
