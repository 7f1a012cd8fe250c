//! # BoundedQueue: fixed-capacity FIFO with backpressure.
//!
//! Producers wait while the queue is full, consumers wait while it is empty.
//! All state transitions happen under one mutex; waiting happens outside of it
//! on two [`Notify`] channels (`not_full`, `not_empty`).
//!
//! ## Shutdown
//! Two mechanisms exist and they compose:
//! - **End-of-stream markers** ([`Envelope::EndOfStream`]): after all producers finish,
//!   the coordinator enqueues one marker **per consumer**. Items are not broadcast,
//!   so each consumer stops at the first marker it dequeues and every consumer gets
//!   exactly one.
//! - **Queue-level close** ([`BoundedQueue::close`]): rejects further `put`s, lets
//!   consumers drain what is already queued, then fails `get` with
//!   [`RuntimeError::QueueShutdown`].
//!
//! ## Rules
//! - `len <= capacity` at all times.
//! - FIFO order; each item is delivered to exactly one consumer.
//! - `put`/`get` are cancel safe: dropping a waiting call never loses or duplicates an item.
//!
//! ```text
//!  put ──► [lock] full? ── yes ──► enable(not_full) ─► unlock ─► wait ─┐
//!                 │                                                   │
//!                 no ─► push_back ─► unlock ─► not_empty.notify_one()  │
//!                  ▲                                                   │
//!                  └───────────────────────────────────────────────────┘
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::debug;

use crate::error::RuntimeError;

/// Queue item wrapper carrying the end-of-stream marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope<T> {
    /// A regular payload.
    Item(T),
    /// Tells exactly one consumer to stop.
    EndOfStream,
}

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
    blocked_producers: usize,
    blocked_consumers: usize,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    capacity: usize,
    not_full: Notify,
    not_empty: Notify,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone, Copy)]
enum Role {
    Producer,
    Consumer,
}

/// Keeps the blocked-waiter counters honest when a waiting call is dropped.
struct Blocked<'a, T> {
    shared: &'a Shared<T>,
    role: Role,
}

impl<'a, T> Blocked<'a, T> {
    fn register(shared: &'a Shared<T>, state: &mut State<T>, role: Role) -> Self {
        match role {
            Role::Producer => state.blocked_producers += 1,
            Role::Consumer => state.blocked_consumers += 1,
        }
        Self { shared, role }
    }
}

impl<T> Drop for Blocked<'_, T> {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        match self.role {
            Role::Producer => state.blocked_producers -= 1,
            Role::Consumer => state.blocked_consumers -= 1,
        }
    }
}

/// Fixed-capacity FIFO queue shared by many producers and consumers.
///
/// Cheap to clone; clones share one queue.
///
/// # Example
/// ```
/// use tasklane::BoundedQueue;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let q = BoundedQueue::new(2).unwrap();
/// q.put("a").await.unwrap();
/// q.put("b").await.unwrap();
/// assert_eq!(q.get().await.unwrap(), "a");
/// assert_eq!(q.get().await.unwrap(), "b");
/// # }
/// ```
pub struct BoundedQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send> BoundedQueue<T> {
    /// Creates a queue holding at most `capacity` items.
    ///
    /// `capacity == 0` is rejected with [`RuntimeError::InvalidConfiguration`].
    pub fn new(capacity: usize) -> Result<Self, RuntimeError> {
        if capacity == 0 {
            return Err(RuntimeError::invalid("queue capacity must be at least 1"));
        }
        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    items: VecDeque::with_capacity(capacity),
                    closed: false,
                    blocked_producers: 0,
                    blocked_consumers: 0,
                }),
                capacity,
                not_full: Notify::new(),
                not_empty: Notify::new(),
            }),
        })
    }

    /// Appends `item`, waiting while the queue is full.
    ///
    /// Fails with [`RuntimeError::QueueShutdown`] if the queue is (or becomes) closed.
    pub async fn put(&self, item: T) -> Result<(), RuntimeError> {
        let shared = &*self.shared;
        let mut blocked: Option<Blocked<'_, T>> = None;
        loop {
            let notified = shared.not_full.notified();
            tokio::pin!(notified);
            {
                let mut state = shared.lock();
                if state.closed {
                    return Err(RuntimeError::QueueShutdown);
                }
                if state.items.len() < shared.capacity {
                    state.items.push_back(item);
                    drop(state);
                    shared.not_empty.notify_one();
                    return Ok(());
                }
                // Register before unlocking so a concurrent `get` cannot slip its
                // wakeup in between.
                notified.as_mut().enable();
                if blocked.is_none() {
                    blocked = Some(Blocked::register(shared, &mut state, Role::Producer));
                }
            }
            notified.await;
        }
    }

    /// Removes and returns the oldest item, waiting while the queue is empty.
    ///
    /// Fails with [`RuntimeError::QueueShutdown`] once the queue is closed **and** drained.
    pub async fn get(&self) -> Result<T, RuntimeError> {
        let shared = &*self.shared;
        let mut blocked: Option<Blocked<'_, T>> = None;
        loop {
            let notified = shared.not_empty.notified();
            tokio::pin!(notified);
            {
                let mut state = shared.lock();
                if let Some(item) = state.items.pop_front() {
                    drop(state);
                    shared.not_full.notify_one();
                    return Ok(item);
                }
                if state.closed {
                    return Err(RuntimeError::QueueShutdown);
                }
                notified.as_mut().enable();
                if blocked.is_none() {
                    blocked = Some(Blocked::register(shared, &mut state, Role::Consumer));
                }
            }
            notified.await;
        }
    }

    /// Appends without waiting; hands the item back if the queue is full.
    pub fn try_put(&self, item: T) -> Result<(), TryPutError<T>> {
        let mut state = self.shared.lock();
        if state.closed {
            return Err(TryPutError::Closed(item));
        }
        if state.items.len() >= self.shared.capacity {
            return Err(TryPutError::Full(item));
        }
        state.items.push_back(item);
        drop(state);
        self.shared.not_empty.notify_one();
        Ok(())
    }

    /// Removes the oldest item without waiting.
    pub fn try_get(&self) -> Option<T> {
        let item = self.shared.lock().items.pop_front();
        if item.is_some() {
            self.shared.not_full.notify_one();
        }
        item
    }

    /// Stops accepting items and wakes every waiter.
    ///
    /// Already queued items remain available to `get`. Idempotent.
    pub fn close(&self) {
        let pending = {
            let mut state = self.shared.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.items.len()
        };
        debug!(pending, "queue closed");
        self.shared.not_full.notify_waiters();
        self.shared.not_empty.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    pub fn len(&self) -> usize {
        self.shared.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Number of `put` calls currently waiting for space.
    pub fn blocked_producers(&self) -> usize {
        self.shared.lock().blocked_producers
    }

    /// Number of `get` calls currently waiting for an item.
    pub fn blocked_consumers(&self) -> usize {
        self.shared.lock().blocked_consumers
    }
}

impl<T: Send> BoundedQueue<Envelope<T>> {
    /// Enqueues one [`Envelope::EndOfStream`] per consumer.
    ///
    /// Waits for space like any other `put`, so markers queue up behind
    /// items that are still being drained.
    pub async fn send_end_markers(&self, consumers: usize) -> Result<(), RuntimeError> {
        for _ in 0..consumers {
            self.put(Envelope::EndOfStream).await?;
        }
        Ok(())
    }

    /// Receives the next payload; `Ok(None)` means this consumer got its end marker.
    pub async fn recv_item(&self) -> Result<Option<T>, RuntimeError> {
        match self.get().await? {
            Envelope::Item(item) => Ok(Some(item)),
            Envelope::EndOfStream => Ok(None),
        }
    }
}

/// Error returned by [`BoundedQueue::try_put`]; carries the rejected item.
#[derive(Debug, PartialEq, Eq)]
pub enum TryPutError<T> {
    /// The queue is at capacity.
    Full(T),
    /// The queue was closed.
    Closed(T),
}

impl<T> TryPutError<T> {
    /// Returns the rejected item.
    pub fn into_inner(self) -> T {
        match self {
            TryPutError::Full(item) | TryPutError::Closed(item) => item,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn zero_capacity_is_rejected() {
        let err = BoundedQueue::<u8>::new(0).err().unwrap();
        assert_eq!(err.as_label(), "runtime_invalid_configuration");
    }

    #[tokio::test]
    async fn fifo_order_is_preserved() {
        let q = BoundedQueue::new(4).unwrap();
        for i in 0..4 {
            q.put(i).await.unwrap();
        }
        let mut got = Vec::new();
        for _ in 0..4 {
            got.push(q.get().await.unwrap());
        }
        assert_eq!(got, vec![0, 1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn put_blocks_on_full_until_get() {
        let q = BoundedQueue::new(1).unwrap();
        q.put(1).await.unwrap();

        let producer = {
            let q = q.clone();
            tokio::spawn(async move { q.put(2).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!producer.is_finished());
        assert_eq!(q.blocked_producers(), 1);
        assert_eq!(q.len(), 1);

        assert_eq!(q.get().await.unwrap(), 1);
        producer.await.unwrap().unwrap();
        assert_eq!(q.blocked_producers(), 0);
        assert_eq!(q.get().await.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn get_blocks_on_empty_until_put() {
        let q = BoundedQueue::<&str>::new(2).unwrap();
        let consumer = {
            let q = q.clone();
            tokio::spawn(async move { q.get().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!consumer.is_finished());
        assert_eq!(q.blocked_consumers(), 1);

        q.put("x").await.unwrap();
        assert_eq!(consumer.await.unwrap().unwrap(), "x");
        assert_eq!(q.blocked_consumers(), 0);
    }

    #[tokio::test]
    async fn close_drains_then_reports_shutdown() {
        let q = BoundedQueue::new(3).unwrap();
        q.put('a').await.unwrap();
        q.put('b').await.unwrap();
        q.close();

        assert!(matches!(q.put('c').await, Err(RuntimeError::QueueShutdown)));
        assert_eq!(q.get().await.unwrap(), 'a');
        assert_eq!(q.get().await.unwrap(), 'b');
        assert!(matches!(q.get().await, Err(RuntimeError::QueueShutdown)));
    }

    #[tokio::test(start_paused = true)]
    async fn close_wakes_blocked_consumer() {
        let q = BoundedQueue::<u8>::new(1).unwrap();
        let consumer = {
            let q = q.clone();
            tokio::spawn(async move { q.get().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        q.close();
        assert!(matches!(
            consumer.await.unwrap(),
            Err(RuntimeError::QueueShutdown)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_waiter_does_not_lose_items() {
        let q = BoundedQueue::new(1).unwrap();
        let waiter = {
            let q = q.clone();
            tokio::spawn(async move { q.get().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        waiter.abort();
        let _ = waiter.await;
        assert_eq!(q.blocked_consumers(), 0);

        q.put(9).await.unwrap();
        assert_eq!(q.try_get(), Some(9));
    }

    #[tokio::test]
    async fn try_put_hands_item_back_when_full() {
        let q = BoundedQueue::new(1).unwrap();
        q.try_put(1).unwrap();
        assert_eq!(q.try_put(2), Err(TryPutError::Full(2)));
        q.close();
        assert_eq!(q.try_put(3).unwrap_err().into_inner(), 3);
    }

    #[tokio::test]
    async fn end_markers_stop_each_consumer_once() {
        let q = BoundedQueue::new(4).unwrap();
        q.put(Envelope::Item(1)).await.unwrap();
        q.send_end_markers(2).await.unwrap();

        assert_eq!(q.recv_item().await.unwrap(), Some(1));
        assert_eq!(q.recv_item().await.unwrap(), None);
        assert_eq!(q.recv_item().await.unwrap(), None);
        assert!(q.is_empty());
    }
}
