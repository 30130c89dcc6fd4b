//! Resilience primitives for calls to unreliable dependencies
//!
//! - **ExponentialBackoff** / **AdaptiveBackoff**: delay sequences for retries
//! - **CircuitBreaker**: fail-fast guard that opens after repeated failures
//! - **FailureRateTracker**: windowed failure ratio for throttling decisions
//! - **retry_with_backoff**: sequential retry loop over a backoff sequence
//!
//! Breakers and failure-rate trackers are long-lived and meant to be shared
//! (typically in an `Arc`) by every caller of one resource.
//!
//! # Usage Example
//!
//! ```
//! use causeway::resilience::{CircuitBreaker, CircuitBreakerConfig};
//!
//! let breaker = CircuitBreaker::new(CircuitBreakerConfig::named("inventory"));
//!
//! let stock = breaker.call(|| Ok::<_, std::io::Error>(12));
//! assert_eq!(stock.unwrap(), 12);
//! ```

pub mod backoff;
pub mod circuit_breaker;
pub mod failure_rate;
pub mod retry;

pub use backoff::{AdaptiveBackoff, BackoffConfig, ExponentialBackoff, DEFAULT_ADAPTIVE_MAX_DELAY};
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState, StateChangeCallback,
};
pub use failure_rate::FailureRateTracker;
pub use retry::{retry_with_backoff, retry_with_backoff_async};
