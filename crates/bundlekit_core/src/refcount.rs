//! Reference Counting Primitives
//!
//! Counters used by loaders and providers to track their dependents.
//!
//! # Design Principles
//! - Counts are signed: a negative value is a bookkeeping bug that
//!   `can_destroy` style checks must still be able to observe
//! - Counts live outside the owner's state lock, so another object can query
//!   them while that lock is held

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

/// Signed reference counter
#[derive(Debug, Default)]
pub struct RefCounter {
    count: AtomicI32,
}

impl RefCounter {
    /// Creates a counter starting at zero
    #[must_use]
    pub fn new() -> Self {
        Self {
            count: AtomicI32::new(0),
        }
    }

    /// Increments the count, returns the new value
    #[inline]
    pub fn add(&self) -> i32 {
        self.count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Decrements the count, returns the new value
    #[inline]
    pub fn release(&self) -> i32 {
        let prev = self.count.fetch_sub(1, Ordering::Release);
        if prev == 1 {
            // Make writes done under the last reference visible to whoever destroys the owner
            std::sync::atomic::fence(Ordering::Acquire);
        }
        prev - 1
    }

    /// Gets the current count
    #[inline]
    pub fn count(&self) -> i32 {
        self.count.load(Ordering::Acquire)
    }

    /// True when no reference is outstanding (or the count went negative)
    #[inline]
    pub fn is_unreferenced(&self) -> bool {
        self.count() <= 0
    }
}

/// A one-shot latch for de-duplicating soft warnings per instance.
#[derive(Debug, Default)]
pub struct OnceFlag {
    tripped: AtomicBool,
}

impl OnceFlag {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tripped: AtomicBool::new(false),
        }
    }

    /// Returns `true` only for the first call.
    #[inline]
    pub fn trip(&self) -> bool {
        !self.tripped.swap(true, Ordering::AcqRel)
    }
}
