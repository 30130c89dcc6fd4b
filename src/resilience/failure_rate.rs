//! Windowed failure-rate tracking
//!
//! A [`FailureRateTracker`] counts calls and failures inside a fixed window.
//! The first call recorded after the window has elapsed clears both counters
//! and starts a new window before it is counted.

use crate::clock::AtomicCounter;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

/// Failure ratio over a rolling window, shared by all callers of one resource
#[derive(Debug)]
pub struct FailureRateTracker {
    failures: AtomicCounter,
    total_calls: AtomicCounter,
    // counters are only written while this lock is held
    window_start: Mutex<Instant>,
    window_size: Duration,
}

impl FailureRateTracker {
    pub fn new(window_size: Duration) -> Self {
        Self {
            failures: AtomicCounter::new(0),
            total_calls: AtomicCounter::new(0),
            window_start: Mutex::new(Instant::now()),
            window_size,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Instant> {
        self.window_start.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Count one call, rolling the window first if it has elapsed
    pub fn record_call(&self, success: bool) {
        let mut window_start = self.lock();

        if window_start.elapsed() >= self.window_size {
            debug!(
                failures = self.failures.load(),
                total = self.total_calls.load(),
                "Failure-rate window elapsed, resetting counters"
            );
            self.failures.store(0);
            self.total_calls.store(0);
            *window_start = Instant::now();
        }

        self.total_calls.increment();
        if !success {
            self.failures.increment();
        }
    }

    /// Failures divided by calls in the current window, 0.0 with no calls
    pub fn failure_rate(&self) -> f64 {
        let _window = self.lock();
        let total = self.total_calls.load();
        if total == 0 {
            return 0.0;
        }
        self.failures.load() as f64 / total as f64
    }

    /// True when the failure rate is strictly above `threshold`
    pub fn should_throttle(&self, threshold: f64) -> bool {
        self.failure_rate() > threshold
    }

    pub fn failures(&self) -> i64 {
        self.failures.load()
    }

    pub fn total_calls(&self) -> i64 {
        self.total_calls.load()
    }

    pub fn window_size(&self) -> Duration {
        self.window_size
    }

    /// Clear the counters and start a new window now
    pub fn reset(&self) {
        let mut window_start = self.lock();
        self.failures.store(0);
        self.total_calls.store(0);
        *window_start = Instant::now();
    }
}
