//! Monotonic status cells.
//!
//! Both state machines of the pipeline only ever move forward. [`StatusCell`]
//! stores a status as an atomic code so it can be read without taking the
//! owner's state lock, and rejects regressions in debug builds.

use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU8, Ordering};

/// A state machine status whose codes are ordered along the forward path.
///
/// Terminal statuses must carry the highest codes.
pub trait Status: Copy + Eq + Debug + Send + Sync + 'static {
    fn code(self) -> u8;

    /// Inverse of [`Status::code`]. Only called with codes produced by `code`.
    fn from_code(code: u8) -> Self;

    fn is_terminal(self) -> bool;
}

/// Atomic, forward-only status storage.
pub struct StatusCell<S: Status> {
    code: AtomicU8,
    _marker: PhantomData<S>,
}

impl<S: Status> StatusCell<S> {
    #[must_use]
    pub fn new(initial: S) -> Self {
        Self {
            code: AtomicU8::new(initial.code()),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn get(&self) -> S {
        S::from_code(self.code.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.get().is_terminal()
    }

    /// Moves to `next`.
    ///
    /// # Panics
    /// In debug builds, if `next` would move the status backwards or out of a
    /// terminal status.
    pub fn advance(&self, next: S) {
        let prev = S::from_code(self.code.swap(next.code(), Ordering::AcqRel));
        debug_assert!(
            prev == next || (!prev.is_terminal() && prev.code() < next.code()),
            "status must not regress: {prev:?} -> {next:?}"
        );
    }
}

impl<S: Status> Debug for StatusCell<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StatusCell").field(&self.get()).finish()
    }
}
