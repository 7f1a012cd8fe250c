use std::marker::PhantomData;
use std::sync::Arc;

use crate::{
    core::{Config, TaskSupervisor},
    error::RuntimeError,
    subscribers::Subscribe,
};

/// Assembles a [`TaskSupervisor`] together with its event subscribers.
///
/// ```rust
/// use std::sync::Arc;
/// use tasklane::{Config, LogWriter, TaskSupervisor};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), tasklane::RuntimeError> {
/// let sup: TaskSupervisor<()> = TaskSupervisor::builder(Config::default())
///     .with_subscriber(Arc::new(LogWriter::new()))
///     .build()?;
/// assert!(sup.list().is_empty());
/// # Ok(())
/// # }
/// ```
pub struct SupervisorBuilder<T> {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    _out: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> SupervisorBuilder<T> {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            _out: PhantomData,
        }
    }

    /// Replaces the subscriber list.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Appends one subscriber.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Creates the supervisor.
    ///
    /// With subscribers, a listener task is spawned, so this must run inside a
    /// tokio runtime. Fails if `max_concurrent` is out of range for a limiter.
    pub fn build(self) -> Result<TaskSupervisor<T>, RuntimeError> {
        TaskSupervisor::new_internal(self.cfg, self.subscribers)
    }
}
