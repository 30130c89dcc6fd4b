//! Lock-free integer counters
//!
//! [`AtomicCounter`] is the building block for the Lamport clock and the
//! failure-rate tracker. Every operation is a single atomic instruction or a
//! compare-and-swap, so counters can be shared freely between threads.

use std::sync::atomic::{AtomicI64, Ordering};

/// Lock-free signed counter
#[derive(Debug, Default)]
pub struct AtomicCounter {
    value: AtomicI64,
}

impl AtomicCounter {
    /// Create a counter starting at `initial`
    pub fn new(initial: i64) -> Self {
        Self {
            value: AtomicI64::new(initial),
        }
    }

    /// Atomically increment and return the new value
    pub fn increment(&self) -> i64 {
        self.add(1)
    }

    /// Atomically decrement and return the new value
    pub fn decrement(&self) -> i64 {
        self.add(-1)
    }

    /// Atomically add `delta` and return the new value
    pub fn add(&self, delta: i64) -> i64 {
        self.value.fetch_add(delta, Ordering::SeqCst).wrapping_add(delta)
    }

    pub fn load(&self) -> i64 {
        self.value.load(Ordering::SeqCst)
    }

    pub fn store(&self, new_value: i64) {
        self.value.store(new_value, Ordering::SeqCst);
    }

    /// Store `new` only if the counter still holds `current`
    ///
    /// Returns true when the swap happened.
    pub fn compare_and_swap(&self, current: i64, new: i64) -> bool {
        self.value
            .compare_exchange(current, new, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// Monotonic sequence numbers backed by an [`AtomicCounter`]
#[derive(Debug, Default)]
pub struct SequenceGenerator {
    counter: AtomicCounter,
}

impl SequenceGenerator {
    /// Create a generator whose first `next()` returns `start + 1`
    pub fn new(start: i64) -> Self {
        Self {
            counter: AtomicCounter::new(start),
        }
    }

    pub fn next(&self) -> i64 {
        self.counter.increment()
    }

    /// The most recently issued number, without advancing
    pub fn current(&self) -> i64 {
        self.counter.load()
    }
}
