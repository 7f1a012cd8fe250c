//! Runtime core: supervision and lifecycle.
//!
//! The public API from this module is [`TaskSupervisor`] (with its builder and
//! handle type), [`Config`] and [`OperationState`].
//!
//! Internal modules:
//! - [`runner`]: drives one operation through limiters and its deadline, publishing events;
//! - [`supervisor`]: spawns, cancels and gathers operations, handles shutdown;
//! - [`registry`]: handle ids to tokens, state cells and join handles;
//! - [`alive`]: operation lifecycle state;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod alive;
mod builder;
mod config;
mod registry;
mod runner;
mod shutdown;
mod supervisor;

pub use alive::OperationState;
pub use builder::SupervisorBuilder;
pub use config::Config;
pub use shutdown::wait_for_shutdown_signal;
pub use supervisor::{OperationHandle, TaskSupervisor};
