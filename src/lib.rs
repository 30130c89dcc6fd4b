//! Distributed-coordination and fault-tolerance primitives.
//!
//! - [`clock`]: atomic counters, Lamport clocks, vector clocks and version vectors
//! - [`trace`]: distributed traces and causality graphs built from vector clocks
//! - [`resilience`]: backoff, circuit breaking, failure-rate tracking and retries

pub mod clock;
pub mod error;
pub mod resilience;
pub mod trace;

pub use error::{CallError, CausewayError, Result, RetryError};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::clock::{LamportClock, VectorClock, VersionComparison, VersionVector};
    pub use crate::error::{CallError, CausewayError, Result, RetryError};
    pub use crate::resilience::{
        retry_with_backoff, retry_with_backoff_async, AdaptiveBackoff, BackoffConfig,
        CircuitBreaker, CircuitBreakerConfig, CircuitState, ExponentialBackoff, FailureRateTracker,
    };
    pub use crate::trace::{build_causality_graph, CausalityGraph, DistributedTrace, TraceStatus};
}
