//! # Producer/consumer pipeline over a [`BoundedQueue`].
//!
//! ```text
//! producer 0 ─┐                          ┌─► consumer 0 ─► stops at its marker
//! producer 1 ─┼─► BoundedQueue(capacity) ─┼─► consumer 1 ─► stops at its marker
//! producer N ─┘                          └─► consumer M ─► stops at its marker
//!
//! coordinator: gather(producers) ─► send_end_markers(M) ─► gather(consumers)
//! ```
//!
//! All producers and consumers run on one [`TaskSupervisor`]. Markers are sent
//! only after every producer settled, so every payload is ahead of every marker.
//!
//! ## End of stream
//! - Every consumer still live: one [`Envelope::EndOfStream`] each.
//! - Some consumer already settled: its marker would never be taken and could
//!   block on a full queue, so the queue is closed instead. Live consumers drain
//!   what is left and stop on [`RuntimeError::QueueShutdown`].
//! - A consumer settling while markers are still blocked: once every consumer
//!   settled the queue is closed, which releases the blocked marker.
//! - A consumer that fails closes the queue itself, so producers and the other
//!   consumers stop instead of waiting for it.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::{Config, TaskSupervisor};
use crate::error::{RuntimeError, TaskError};
use crate::sync::{BoundedQueue, Envelope};
use crate::tasks::{OperationFn, OperationRef, Outcome, sleep_or_cancel, until_cancelled};

/// Shape of one pipeline run.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Number of producer operations.
    pub producers: usize,
    /// Number of consumer operations (one end marker each).
    pub consumers: usize,
    /// Items each producer puts.
    pub items_per_producer: usize,
    /// Queue capacity (at least 1).
    pub capacity: usize,
    /// Smallest pause between items.
    pub min_pause: Duration,
    /// Largest pause between items.
    pub max_pause: Duration,
    /// Items a single consumer takes before it leaves (`None` = until end of stream).
    pub max_per_consumer: Option<usize>,
}

impl Default for PipelineConfig {
    /// Three producers of 10 items, three consumers, capacity 5, pauses up to 100ms.
    fn default() -> Self {
        Self {
            producers: 3,
            consumers: 3,
            items_per_producer: 10,
            capacity: 5,
            min_pause: Duration::ZERO,
            max_pause: Duration::from_millis(100),
            max_per_consumer: None,
        }
    }
}

impl PipelineConfig {
    /// Random pause in `[min_pause, max_pause]`.
    fn pause(&self) -> Duration {
        let lo = self.min_pause.as_millis() as u64;
        let hi = (self.max_pause.as_millis() as u64).max(lo);
        if hi == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(lo..=hi))
    }
}

/// One payload moving through the queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Item {
    /// Index of the producer that made it.
    pub producer: usize,
    /// Position within that producer's stream.
    pub seq: usize,
}

/// What a pipeline run produced and consumed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Items put, per producer.
    pub produced: Vec<usize>,
    /// Items taken, per consumer.
    pub consumed: Vec<usize>,
    /// Producers or consumers that did not finish with a value.
    pub incomplete: usize,
}

impl PipelineReport {
    pub fn total_produced(&self) -> usize {
        self.produced.iter().sum()
    }

    pub fn total_consumed(&self) -> usize {
        self.consumed.iter().sum()
    }
}

/// Runs producers and consumers to completion and reports the counts.
///
/// Fails only on invalid configuration: capacity 0, or items to move with no
/// consumer to take them.
pub async fn run(cfg: PipelineConfig) -> Result<PipelineReport, RuntimeError> {
    if cfg.consumers == 0 && cfg.producers * cfg.items_per_producer > 0 {
        return Err(RuntimeError::invalid("pipeline needs at least one consumer"));
    }
    let queue: BoundedQueue<Envelope<Item>> = BoundedQueue::new(cfg.capacity)?;
    let sup: TaskSupervisor<usize> = TaskSupervisor::new(Config::default())?;
    let cfg = Arc::new(cfg);

    let producers: Vec<_> = (0..cfg.producers)
        .map(|idx| sup.spawn_op(producer(idx, queue.clone(), Arc::clone(&cfg))))
        .collect();
    let consumers: Vec<_> = (0..cfg.consumers)
        .map(|idx| sup.spawn_op(consumer(idx, queue.clone(), Arc::clone(&cfg))))
        .collect();

    let produced = sup.gather_all(&producers).await?;
    let live = consumers
        .iter()
        .filter(|h| sup.state(h).is_ok_and(|st| !st.is_terminal()))
        .count();
    let consumed = if live == cfg.consumers {
        info!(producers = produced.len(), consumers = live, "producers finished; sending end markers");
        let markers = queue.send_end_markers(live);
        let gather = sup.gather_all(&consumers);
        tokio::pin!(markers, gather);
        tokio::select! {
            sent = &mut markers => {
                match sent {
                    Ok(()) | Err(RuntimeError::QueueShutdown) => {}
                    Err(e) => return Err(e),
                }
                gather.await?
            }
            consumed = &mut gather => {
                debug!("consumers settled before taking every marker; closing queue");
                queue.close();
                consumed?
            }
        }
    } else {
        warn!(live, expected = cfg.consumers, "consumers settled early; closing queue instead of sending markers");
        queue.close();
        sup.gather_all(&consumers).await?
    };

    let incomplete = produced
        .iter()
        .chain(consumed.iter())
        .filter(|o| !o.is_value())
        .count();
    let count = |o: &Outcome<usize>| o.value().copied().unwrap_or(0);
    Ok(PipelineReport {
        produced: produced.iter().map(count).collect(),
        consumed: consumed.iter().map(count).collect(),
        incomplete,
    })
}

fn producer(idx: usize, queue: BoundedQueue<Envelope<Item>>, cfg: Arc<PipelineConfig>) -> OperationRef<usize> {
    OperationFn::arc(format!("producer-{idx}"), move |ctx: CancellationToken| {
        let queue = queue.clone();
        let cfg = Arc::clone(&cfg);
        async move {
            for seq in 0..cfg.items_per_producer {
                sleep_or_cancel(&ctx, cfg.pause()).await?;
                let item = Item { producer: idx, seq };
                until_cancelled(&ctx, queue.put(Envelope::Item(item)))
                    .await?
                    .map_err(|e| TaskError::fail(e.to_string()))?;
                debug!(producer = idx, seq, "produced");
            }
            info!(producer = idx, items = cfg.items_per_producer, "producer done");
            Ok::<usize, TaskError>(cfg.items_per_producer)
        }
    })
}

fn consumer(idx: usize, queue: BoundedQueue<Envelope<Item>>, cfg: Arc<PipelineConfig>) -> OperationRef<usize> {
    OperationFn::arc(format!("consumer-{idx}"), move |ctx: CancellationToken| {
        let queue = queue.clone();
        let cfg = Arc::clone(&cfg);
        async move {
            let res = consume(idx, &queue, &cfg, &ctx).await;
            if res.is_err() {
                queue.close();
            }
            res
        }
    })
}

async fn consume(
    idx: usize,
    queue: &BoundedQueue<Envelope<Item>>,
    cfg: &PipelineConfig,
    ctx: &CancellationToken,
) -> Result<usize, TaskError> {
    let mut taken = 0usize;
    loop {
        if cfg.max_per_consumer.is_some_and(|max| taken >= max) {
            info!(consumer = idx, consumed = taken, "consumer reached its quota");
            return Ok(taken);
        }
        let next = match until_cancelled(ctx, queue.recv_item()).await? {
            Ok(next) => next,
            Err(RuntimeError::QueueShutdown) => {
                info!(consumer = idx, consumed = taken, "queue closed and drained");
                return Ok(taken);
            }
            Err(e) => return Err(TaskError::fail(e.to_string())),
        };
        let Some(item) = next else {
            info!(consumer = idx, consumed = taken, "consumer received end marker");
            return Ok(taken);
        };
        taken += 1;
        debug!(consumer = idx, producer = item.producer, seq = item.seq, "consumed");
        sleep_or_cancel(ctx, cfg.pause()).await?;
    }
}
