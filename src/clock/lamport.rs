//! Scalar Lamport clock
//!
//! A Lamport clock yields a total order that is consistent with causality: if
//! event `a` causally precedes `b` then `L(a) < L(b)`. The converse does not
//! hold. Two events with `L(a) < L(b)` may still be concurrent, so use a
//! [`VectorClock`](super::VectorClock) when true happens-before is required.

use super::atomic_counter::AtomicCounter;

/// Lock-free Lamport logical clock
///
/// The value never decreases. All operations are safe to call from many
/// threads at once.
#[derive(Debug, Default)]
pub struct LamportClock {
    counter: AtomicCounter,
}

impl LamportClock {
    pub fn new() -> Self {
        Self {
            counter: AtomicCounter::new(0),
        }
    }

    /// Record a local event and return its timestamp
    pub fn tick(&self) -> i64 {
        self.advance_past(i64::MIN)
    }

    /// Merge a timestamp received from another process
    ///
    /// Sets the clock to `max(current, received) + 1` and returns the new value.
    /// The clock saturates at `i64::MAX` instead of wrapping.
    pub fn update(&self, received: i64) -> i64 {
        self.advance_past(received)
    }

    fn advance_past(&self, floor: i64) -> i64 {
        loop {
            let current = self.counter.load();
            let next = current.max(floor).saturating_add(1);
            if self.counter.compare_and_swap(current, next) {
                return next;
            }
        }
    }

    /// Read the clock without advancing it
    pub fn current(&self) -> i64 {
        self.counter.load()
    }
}
