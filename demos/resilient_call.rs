//! Resilience example.
//!
//! Guards a flaky downstream dependency with a circuit breaker, retries it
//! with exponential backoff, and adapts delays to system load.
//! It demonstrates:
//! - CircuitBreaker::call_async with a per-call timeout
//! - retry_with_backoff_async with a deadline used as the cancellation signal
//! - FailureRateTracker for throttling decisions
//! - AdaptiveBackoff reacting to load samples
//!
//! Configuration is read from CAUSEWAY_BACKOFF_* and CAUSEWAY_BREAKER_*
//! environment variables when set.

use causeway::resilience::{
    retry_with_backoff_async, AdaptiveBackoff, BackoffConfig, CircuitBreaker, CircuitBreakerConfig,
    FailureRateTracker,
};
use causeway::CallError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
#[error("quote service unavailable (call {0})")]
struct Unavailable(usize);

/// Fails the first three calls, then answers
async fn fetch_quote(calls: Arc<AtomicUsize>) -> Result<f64, Unavailable> {
    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
    tokio::time::sleep(Duration::from_millis(20)).await;
    if n <= 3 {
        Err(Unavailable(n))
    } else {
        Ok(101.25)
    }
}

#[tokio::main]
async fn main() -> causeway::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
        failure_threshold: 5,
        timeout: Duration::from_millis(500),
        ..CircuitBreakerConfig::from_env("quote-service")?
    }));
    let tracker = Arc::new(FailureRateTracker::new(Duration::from_secs(30)));
    let calls = Arc::new(AtomicUsize::new(0));

    let backoff = BackoffConfig {
        initial_delay: Duration::from_millis(50),
        ..BackoffConfig::from_env()?
    };
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);

    let quote = retry_with_backoff_async(
        || {
            let (breaker, tracker, calls) =
                (Arc::clone(&breaker), Arc::clone(&tracker), Arc::clone(&calls));
            async move {
                let result = breaker.call_async(|| fetch_quote(calls)).await;
                tracker.record_call(result.is_ok());
                result
            }
        },
        backoff.clone(),
        tokio::time::sleep_until(deadline),
    )
    .await;

    match quote {
        Ok(price) => println!("quote: {}", price),
        Err(e) => match e.last_error() {
            Some(CallError::CircuitOpen { name }) => println!("gave up, breaker {} is open", name),
            _ => println!("gave up: {}", e),
        },
    }

    println!("breaker stats: {}", serde_json::to_string(&breaker.stats())?);
    println!(
        "failure rate: {:.2} (throttle above 0.5: {})",
        tracker.failure_rate(),
        tracker.should_throttle(0.5)
    );

    let mut adaptive = AdaptiveBackoff::new(backoff);
    for (cpu, mem) in [(10.0, 20.0), (70.0, 60.0), (95.0, 90.0)] {
        adaptive.adjust_load_factor(cpu, mem);
        println!(
            "cpu {:>3}% mem {:>3}% -> factor {:.2}, next delay {:?}",
            cpu,
            mem,
            adaptive.load_factor(),
            adaptive.next_delay()
        );
    }

    Ok(())
}
