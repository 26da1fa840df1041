//! One-shot, multi-waiter completion signal.
//!
//! Used for the connection's "initial settings written" event and each
//! stream's completion. Set at most once (later calls are no-ops),
//! observable by any number of waiters, never reset.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Inner {
    set: Mutex<bool>,
    cond: Condvar,
}

/// A clonable handle to a single-assignment event.
#[derive(Clone, Default)]
pub struct Signal {
    inner: Arc<Inner>,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal, waking all current and future waiters. Idempotent.
    pub fn set(&self) {
        let mut set = self
            .inner
            .set
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *set = true;
        self.inner.cond.notify_all();
    }

    pub fn is_set(&self) -> bool {
        *self.inner.set.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Block until the signal fires. Returns immediately if already set.
    pub fn wait(&self) {
        let mut set = self
            .inner
            .set
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        while !*set {
            set = self
                .inner
                .cond
                .wait(set)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Block until the signal fires or the timeout elapses. Returns
    /// whether the signal is set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut set = self
            .inner
            .set
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        while !*set {
            let (guard, result) = self
                .inner
                .cond
                .wait_timeout(set, timeout)
                .unwrap_or_else(|e| e.into_inner());
            set = guard;
            if result.timed_out() {
                return *set;
            }
        }
        true
    }

    /// Whether two handles observe the same underlying event.
    pub fn same_signal(&self, other: &Signal) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal").field("set", &self.is_set()).finish()
    }
}
