//! Manual-reset completion signal.
//!
//! A provider sets its signal once, when it reaches a terminal status.
//! Blocking waiters park on a condvar; async waiters subscribe to a
//! `tokio::sync::watch` channel, which needs no runtime to be polled.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tokio::sync::watch;

pub struct CompletionSignal {
    done: Mutex<bool>,
    cond: Condvar,
    watch: watch::Sender<bool>,
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionSignal {
    #[must_use]
    pub fn new() -> Self {
        let (watch, _) = watch::channel(false);
        Self {
            done: Mutex::new(false),
            cond: Condvar::new(),
            watch,
        }
    }

    /// Sets the signal and wakes every waiter. Stays set.
    pub fn set(&self) {
        let mut done = self.done.lock();
        *done = true;
        self.cond.notify_all();
        self.watch.send_replace(true);
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        *self.done.lock()
    }

    /// Blocks the calling thread until the signal is set.
    pub fn wait(&self) {
        let mut done = self.done.lock();
        while !*done {
            self.cond.wait(&mut done);
        }
    }

    /// Blocks for at most `timeout`. Returns whether the signal is set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut done = self.done.lock();
        if !*done {
            // Spurious wakeups just end the wait early; the caller gets the current state.
            let _ = self.cond.wait_for(&mut done, timeout);
        }
        *done
    }

    /// Resolves once the signal is set.
    pub async fn wait_async(&self) {
        let mut rx = self.watch.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|done| *done).await;
    }
}

impl std::fmt::Debug for CompletionSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionSignal")
            .field("set", &self.is_set())
            .finish()
    }
}
