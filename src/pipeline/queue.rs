//! Bounded blocking queue with generation-based invalidation

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::utils::CachePadded;
use parking_lot::{Condvar, Mutex};

use crate::pipeline::cancel::{CancelToken, Wake};

/// What happened to an item handed to [`BoundedQueue::push`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed,
    /// The queue was cleared while the producer waited for space
    Dropped,
    Cancelled,
}

struct State<T> {
    items: VecDeque<T>,
    generation: u64,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<T: Send> Wake for Shared<T> {
    fn wake(&self) {
        let _state = self.state.lock();
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }
}

#[derive(Default)]
struct Stats {
    pushed: AtomicUsize,
    popped: AtomicUsize,
    dropped: AtomicUsize,
}

/// Snapshot of queue counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub pushed: usize,
    pub popped: usize,
    /// Items discarded by `clear()` or by a clear racing a blocked push
    pub dropped: usize,
}

/// Fixed-capacity FIFO shared between one producer stage and one consumer stage.
///
/// `clear()` empties the queue and advances an internal generation; a push
/// or pop that was blocked across a clear resolves as a no-op instead of
/// moving data between epochs.
pub struct BoundedQueue<T> {
    shared: Arc<Shared<T>>,
    capacity: usize,
    stats: CachePadded<Stats>,
}

impl<T: Send + 'static> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    items: VecDeque::with_capacity(capacity.max(1)),
                    generation: 0,
                }),
                not_full: Condvar::new(),
                not_empty: Condvar::new(),
            }),
            capacity: capacity.max(1),
            stats: CachePadded::new(Stats::default()),
        }
    }

    /// Producer: append `item`, waiting while the queue is full
    pub fn push(&self, item: T, cancel: &CancelToken) -> PushOutcome {
        let _registration = cancel.register(self.shared.clone());
        let mut state = self.shared.state.lock();
        let generation = state.generation;

        loop {
            if cancel.is_cancelled() {
                return PushOutcome::Cancelled;
            }
            if state.generation != generation {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                return PushOutcome::Dropped;
            }
            if state.items.len() < self.capacity {
                break;
            }
            self.shared.not_full.wait(&mut state);
        }

        state.items.push_back(item);
        drop(state);
        self.stats.pushed.fetch_add(1, Ordering::Relaxed);
        self.shared.not_empty.notify_one();
        PushOutcome::Pushed
    }

    /// Consumer: take the oldest item, waiting while the queue is empty.
    ///
    /// Returns `None` when cancelled or when the queue was cleared while
    /// waiting; callers tell the two apart through the token.
    pub fn wait_and_pop(&self, cancel: &CancelToken) -> Option<T> {
        let _registration = cancel.register(self.shared.clone());
        let mut state = self.shared.state.lock();
        let generation = state.generation;

        loop {
            if cancel.is_cancelled() || state.generation != generation {
                return None;
            }
            if let Some(item) = state.items.pop_front() {
                drop(state);
                self.stats.popped.fetch_add(1, Ordering::Relaxed);
                self.shared.not_full.notify_one();
                return Some(item);
            }
            self.shared.not_empty.wait(&mut state);
        }
    }

    /// Drop everything queued and invalidate blocked producers and consumers
    pub fn clear(&self) {
        let discarded = {
            let mut state = self.shared.state.lock();
            let discarded = state.items.len();
            state.items.clear();
            state.generation += 1;
            discarded
        };

        self.stats.dropped.fetch_add(discarded, Ordering::Relaxed);
        self.shared.not_full.notify_all();
        self.shared.not_empty.notify_all();
    }

    pub fn is_empty(&self) -> bool {
        self.shared.state.lock().items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().items.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pushed: self.stats.pushed.load(Ordering::Relaxed),
            popped: self.stats.popped.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
        }
    }
}
