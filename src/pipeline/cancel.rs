//! Cooperative cancellation shared by every blocking primitive.
//!
//! A blocking call registers a [`Wake`] for as long as it may sleep.
//! `cancel()` raises the flag first and then wakes every registration, so a
//! waiter that checks the flag under its own lock after registering can
//! never miss the signal.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Something parked on a condition variable that can be poked awake.
///
/// Implementations must take the lock guarding their wait condition before
/// notifying, otherwise a wakeup can slip in between check and wait.
pub trait Wake: Send + Sync {
    fn wake(&self);
}

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    next_id: AtomicU64,
    wakers: Mutex<Vec<(u64, Arc<dyn Wake>)>>,
    done: Condvar,
}

/// Clonable handle on one cancellation signal
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

/// Keeps a waker registered until dropped
pub struct Registration<'a> {
    token: &'a CancelToken,
    id: u64,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Raise the signal. Only the first call wakes anyone.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }

        let wakers = std::mem::take(&mut *self.inner.wakers.lock());
        self.inner.done.notify_all();
        for (_, waker) in wakers {
            waker.wake();
        }
    }

    pub fn register(&self, waker: Arc<dyn Wake>) -> Registration<'_> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.wakers.lock().push((id, waker));
        Registration { token: self, id }
    }

    /// Block until cancelled
    pub fn wait(&self) {
        let mut wakers = self.inner.wakers.lock();
        while !self.is_cancelled() {
            self.inner.done.wait(&mut wakers);
        }
    }

    /// Block until cancelled or `timeout` elapses; returns whether cancelled
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut wakers = self.inner.wakers.lock();
        if !self.is_cancelled() {
            self.inner
                .done
                .wait_while_for(&mut wakers, |_| !self.is_cancelled(), timeout);
        }
        self.is_cancelled()
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.token
            .inner
            .wakers
            .lock()
            .retain(|(id, _)| *id != self.id);
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
