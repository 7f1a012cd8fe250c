//! # Operation registry: handle ids to runner state.
//!
//! The registry owns what the supervisor needs to answer questions about an
//! operation after spawning it: its name, cancellation token, shared state cell
//! and the runner's join handle (until gathered). Once gathered, an operation
//! shrinks to its final [`OperationState`].
//!
//! ## Architecture
//! ```text
//! TaskSupervisor::spawn ──► Registry::insert(id, Entry)
//!                                  │
//! cancel(h) / state(h) ──► lookup(id)   (read lock)
//! gather_all(hs)       ──► take_joins(ids)  (write lock, all-or-nothing)
//!                      ──► retire(id)       (entry dropped, final state kept)
//! shutdown()           ──► wait_settled()   (Notify, woken by runners)
//! ```
//!
//! ## Rules
//! - A gathered, terminal entry is retired: its token, name and state cell are
//!   dropped and only `id → final state` remains, so `state` and `cancel` still
//!   answer and a second gather still reports `AlreadyGathered`.
//! - `take_joins` validates **every** id before taking any join handle, so a bad
//!   call leaves the registry untouched.
//! - The lock is never held across an `.await`.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::alive::{OperationState, StateCell};
use crate::error::RuntimeError;
use crate::tasks::Outcome;

/// Per-operation bookkeeping.
struct Entry<T> {
    name: Arc<str>,
    token: CancellationToken,
    state: Arc<StateCell>,
    join: Option<JoinHandle<Outcome<T>>>,
}

/// Cheap view of an entry handed out to callers.
pub(crate) struct EntryView {
    pub(crate) name: Arc<str>,
    pub(crate) token: CancellationToken,
    pub(crate) state: Arc<StateCell>,
}

/// A runner join handle taken out for gathering.
pub(crate) struct Taken<T> {
    pub(crate) id: u64,
    pub(crate) name: Arc<str>,
    pub(crate) state: Arc<StateCell>,
    pub(crate) join: JoinHandle<Outcome<T>>,
}

struct Table<T> {
    live: HashMap<u64, Entry<T>>,
    retired: HashMap<u64, OperationState>,
}

pub(crate) struct Registry<T> {
    ops: RwLock<Table<T>>,
    next_id: AtomicU64,
    settled: Arc<Notify>,
}

impl<T> Registry<T> {
    pub(crate) fn new() -> Self {
        Self {
            ops: RwLock::new(Table {
                live: HashMap::new(),
                retired: HashMap::new(),
            }),
            next_id: AtomicU64::new(0),
            settled: Arc::new(Notify::new()),
        }
    }

    /// Reserves a fresh handle id.
    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Notifier the runners poke after reaching a terminal state.
    pub(crate) fn settled(&self) -> Arc<Notify> {
        Arc::clone(&self.settled)
    }

    pub(crate) fn insert(
        &self,
        id: u64,
        name: Arc<str>,
        token: CancellationToken,
        state: Arc<StateCell>,
        join: JoinHandle<Outcome<T>>,
    ) {
        let mut ops = self.ops.write().unwrap_or_else(PoisonError::into_inner);
        ops.live.insert(
            id,
            Entry {
                name,
                token,
                state,
                join: Some(join),
            },
        );
    }

    pub(crate) fn lookup(&self, id: u64) -> Option<EntryView> {
        let ops = self.ops.read().unwrap_or_else(PoisonError::into_inner);
        ops.live.get(&id).map(|e| EntryView {
            name: Arc::clone(&e.name),
            token: e.token.clone(),
            state: Arc::clone(&e.state),
        })
    }

    /// Takes the join handles for `ids`, in order.
    ///
    /// Fails without side effects if any id is unknown, was gathered before, or
    /// appears twice in `ids`.
    pub(crate) fn take_joins(&self, ids: &[u64]) -> Result<Vec<Taken<T>>, RuntimeError> {
        let mut ops = self.ops.write().unwrap_or_else(PoisonError::into_inner);

        let mut seen = HashSet::with_capacity(ids.len());
        for &id in ids {
            if ops.retired.contains_key(&id) {
                return Err(RuntimeError::AlreadyGathered { id });
            }
            let entry = ops.live.get(&id).ok_or(RuntimeError::UnknownHandle { id })?;
            if entry.join.is_none() || !seen.insert(id) {
                return Err(RuntimeError::AlreadyGathered { id });
            }
        }

        let mut taken = Vec::with_capacity(ids.len());
        for &id in ids {
            if let Some(entry) = ops.live.get_mut(&id)
                && let Some(join) = entry.join.take()
            {
                taken.push(Taken {
                    id,
                    name: Arc::clone(&entry.name),
                    state: Arc::clone(&entry.state),
                    join,
                });
            }
        }
        Ok(taken)
    }

    /// Shrinks a gathered entry to its final state. Non-terminal entries stay.
    pub(crate) fn retire(&self, id: u64) {
        let mut ops = self.ops.write().unwrap_or_else(PoisonError::into_inner);
        let state = match ops.live.get(&id) {
            Some(e) if e.join.is_none() && e.state.get().is_terminal() => e.state.get(),
            _ => return,
        };
        ops.live.remove(&id);
        ops.retired.insert(id, state);
    }

    /// Number of entries still holding a token and state cell.
    #[cfg(test)]
    pub(crate) fn tracked(&self) -> usize {
        self.ops.read().unwrap_or_else(PoisonError::into_inner).live.len()
    }

    /// Returns sorted names of operations that are not yet terminal.
    pub(crate) fn live_names(&self) -> Vec<String> {
        let ops = self.ops.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = ops
            .live
            .values()
            .filter(|e| !e.state.get().is_terminal())
            .map(|e| e.name.to_string())
            .collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn is_alive(&self, name: &str) -> bool {
        let ops = self.ops.read().unwrap_or_else(PoisonError::into_inner);
        ops.live
            .values()
            .any(|e| &*e.name == name && !e.state.get().is_terminal())
    }

    pub(crate) fn state(&self, id: u64) -> Option<OperationState> {
        let ops = self.ops.read().unwrap_or_else(PoisonError::into_inner);
        ops.live
            .get(&id)
            .map(|e| e.state.get())
            .or_else(|| ops.retired.get(&id).copied())
    }

    /// Waits until every registered operation is terminal.
    pub(crate) async fn wait_settled(&self) {
        loop {
            let notified = self.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.live_names().is_empty() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(reg: &Registry<u8>, name: &str, out: u8) -> u64 {
        let id = reg.next_id();
        let state = Arc::new(StateCell::new());
        state.set(OperationState::Completed);
        let join = tokio::spawn(async move { Outcome::Value(out) });
        reg.insert(id, Arc::from(name), CancellationToken::new(), state, join);
        id
    }

    #[tokio::test]
    async fn bad_ids_leave_registry_untouched() {
        let reg = Registry::<u8>::new();
        let a = register(&reg, "a", 1);

        assert!(matches!(
            reg.take_joins(&[a, 99]),
            Err(RuntimeError::UnknownHandle { id: 99 })
        ));
        assert!(matches!(
            reg.take_joins(&[a, a]),
            Err(RuntimeError::AlreadyGathered { .. })
        ));

        let taken = reg.take_joins(&[a]).unwrap();
        assert_eq!(taken.len(), 1);
        assert_eq!(taken.into_iter().next().unwrap().join.await.unwrap(), Outcome::Value(1));
        assert!(matches!(
            reg.take_joins(&[a]),
            Err(RuntimeError::AlreadyGathered { id }) if id == a
        ));
    }

    #[tokio::test]
    async fn gathered_entries_shrink_to_their_final_state() {
        let reg = Registry::<u8>::new();
        for round in 0..1000u32 {
            let id = register(&reg, "cycle", (round % 200) as u8);
            for t in reg.take_joins(&[id]).unwrap() {
                t.join.await.unwrap();
            }
            reg.retire(id);
        }
        assert_eq!(reg.tracked(), 0);
        assert_eq!(reg.state(999), Some(OperationState::Completed));
        assert!(reg.lookup(999).is_none());
        assert!(matches!(
            reg.take_joins(&[999]),
            Err(RuntimeError::AlreadyGathered { id: 999 })
        ));
    }

    #[tokio::test]
    async fn ungathered_entries_are_not_retired() {
        let reg = Registry::<u8>::new();
        let id = register(&reg, "kept", 3);
        reg.retire(id);
        assert_eq!(reg.tracked(), 1);
        assert!(reg.lookup(id).is_some());
    }

    #[tokio::test]
    async fn terminal_entries_are_not_alive() {
        let reg = Registry::<u8>::new();
        register(&reg, "done", 0);
        assert!(reg.live_names().is_empty());
        assert!(!reg.is_alive("done"));
        reg.wait_settled().await;
    }
}
