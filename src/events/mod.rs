//! Lifecycle events and the channel that carries them.
//!
//! - [`EventKind`], [`Event`]: what happened, to which operation, and when
//! - [`Bus`]: broadcast channel shared by the supervisor and its runners
//!
//! Every supervised operation contributes `OperationSpawned`, then usually
//! `OperationStarting`, then exactly one terminal kind (see [`EventKind::is_terminal`]).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
