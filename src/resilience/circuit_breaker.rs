//! Circuit breaker for guarding calls to an unreliable dependency
//!
//! # States
//! - Closed: calls pass through, consecutive failures are counted
//! - Open: calls fail fast with [`CallError::CircuitOpen`]
//! - Half-Open: calls pass through as probes until enough succeed
//!
//! # State Transitions
//! ```text
//! Closed    → Open:      failures >= failure_threshold
//! Open      → Half-Open: recovery_timeout elapsed since the last failure,
//!                        checked when the next call is attempted
//! Half-Open → Closed:    successes >= success_threshold
//! Half-Open → Open:      any failure
//! ```
//!
//! Errors whose message contains one of the configured expected-failure
//! substrings count as successes. They are business outcomes, not signs that
//! the dependency is unhealthy.
//!
//! One breaker is shared by every caller of a resource. All state lives behind
//! a single mutex that is never held while the protected call runs.

use super::backoff::parse_var;
use crate::error::{CallError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        };
        f.write_str(s)
    }
}

/// Configuration for a circuit breaker
///
/// Zero thresholds and durations are treated as unset and replaced by the
/// defaults when the breaker is built.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    pub name: String,
    /// Consecutive failures before opening
    pub failure_threshold: u32,
    /// Time to wait after the last failure before probing
    pub recovery_timeout: Duration,
    /// Half-open successes needed to close
    pub success_threshold: u32,
    /// Deadline for each call made through [`CircuitBreaker::call_async`]
    pub timeout: Duration,
    /// Error message substrings that do not count as failures
    pub expected_failures: Vec<String>,
}

const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_SUCCESS_THRESHOLD: u32 = 3;
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            timeout: DEFAULT_CALL_TIMEOUT,
            expected_failures: Vec::new(),
        }
    }
}

impl CircuitBreakerConfig {
    /// Defaults for a breaker called `name`
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Defaults overlaid with `CAUSEWAY_BREAKER_*` environment variables
    ///
    /// Reads `FAILURE_THRESHOLD`, `RECOVERY_TIMEOUT_MS`, `SUCCESS_THRESHOLD`,
    /// `TIMEOUT_MS` and `EXPECTED_FAILURES` (comma separated).
    pub fn from_env(name: impl Into<String>) -> Result<Self> {
        Self::from_vars(name, |key| std::env::var(key).ok())
    }

    pub(crate) fn from_vars(
        name: impl Into<String>,
        vars: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = Self::named(name);

        if let Some(threshold) = parse_var::<u32>(&vars, "CAUSEWAY_BREAKER_FAILURE_THRESHOLD")? {
            config.failure_threshold = threshold;
        }
        if let Some(ms) = parse_var::<u64>(&vars, "CAUSEWAY_BREAKER_RECOVERY_TIMEOUT_MS")? {
            config.recovery_timeout = Duration::from_millis(ms);
        }
        if let Some(threshold) = parse_var::<u32>(&vars, "CAUSEWAY_BREAKER_SUCCESS_THRESHOLD")? {
            config.success_threshold = threshold;
        }
        if let Some(ms) = parse_var::<u64>(&vars, "CAUSEWAY_BREAKER_TIMEOUT_MS")? {
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(raw) = vars("CAUSEWAY_BREAKER_EXPECTED_FAILURES") {
            config.expected_failures = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        Ok(config)
    }

    fn with_defaults_for_unset(mut self) -> Self {
        if self.failure_threshold == 0 {
            self.failure_threshold = DEFAULT_FAILURE_THRESHOLD;
        }
        if self.recovery_timeout.is_zero() {
            self.recovery_timeout = DEFAULT_RECOVERY_TIMEOUT;
        }
        if self.success_threshold == 0 {
            self.success_threshold = DEFAULT_SUCCESS_THRESHOLD;
        }
        if self.timeout.is_zero() {
            self.timeout = DEFAULT_CALL_TIMEOUT;
        }
        self
    }
}

/// Called with the breaker name, the previous state and the new state
pub type StateChangeCallback = Arc<dyn Fn(&str, CircuitState, CircuitState) + Send + Sync>;

/// Point-in-time view of a breaker, suitable for health endpoints
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitBreakerStats {
    pub name: String,
    pub state: CircuitState,
    pub failures: u32,
    pub successes: u32,
    pub last_failure: Option<DateTime<Utc>>,
    pub failure_threshold: u32,
    pub recovery_timeout_ms: u64,
    pub success_threshold: u32,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failures: u32,
    successes: u32,
    last_failure: Option<Instant>,
    last_failure_at: Option<DateTime<Utc>>,
}

impl BreakerState {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: 0,
            successes: 0,
            last_failure: None,
            last_failure_at: None,
        }
    }

    fn mark_failure(&mut self) {
        self.failures = self.failures.saturating_add(1);
        self.last_failure = Some(Instant::now());
        self.last_failure_at = Some(Utc::now());
    }
}

type Transition = Option<(CircuitState, CircuitState)>;

pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
    on_state_change: Option<StateChangeCallback>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("inner", &self.inner)
            .field("on_state_change", &self.on_state_change.is_some())
            .finish()
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config: config.with_defaults_for_unset(),
            inner: Mutex::new(BreakerState::closed()),
            on_state_change: None,
        }
    }

    /// Register a callback fired after every state transition
    pub fn with_state_change_callback(mut self, callback: StateChangeCallback) -> Self {
        self.on_state_change = Some(callback);
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state
    ///
    /// An open breaker reports `Open` until a call is attempted after the
    /// recovery timeout.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self.lock();
        CircuitBreakerStats {
            name: self.config.name.clone(),
            state: inner.state,
            failures: inner.failures,
            successes: inner.successes,
            last_failure: inner.last_failure_at,
            failure_threshold: self.config.failure_threshold,
            recovery_timeout_ms: self.config.recovery_timeout.as_millis() as u64,
            success_threshold: self.config.success_threshold,
        }
    }

    /// Force the breaker closed and clear all counters
    pub fn reset(&self) {
        let transition = {
            let mut inner = self.lock();
            let from = inner.state;
            *inner = BreakerState::closed();
            (from != CircuitState::Closed).then_some((from, CircuitState::Closed))
        };
        self.notify(transition);
    }

    /// Run `f` if the breaker allows it and record the outcome
    ///
    /// Returns [`CallError::CircuitOpen`] without invoking `f` while the
    /// breaker is open.
    ///
    /// The configured `timeout` is not enforced here: `f` runs to completion
    /// on the calling thread however long it takes. Use
    /// [`call_async`](Self::call_async) when calls need a deadline.
    pub fn call<T, E, F>(&self, f: F) -> std::result::Result<T, CallError<E>>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: fmt::Display,
    {
        self.acquire()?;
        let result = f();
        self.record_outcome(&result);
        result.map_err(CallError::Inner)
    }

    /// Async variant of [`call`](Self::call) that enforces the configured timeout
    ///
    /// A call that exceeds `timeout` is abandoned, counted as a failure and
    /// reported as [`CallError::Timeout`].
    pub async fn call_async<T, E, F, Fut>(&self, f: F) -> std::result::Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: fmt::Display,
    {
        self.acquire()?;

        match tokio::time::timeout(self.config.timeout, f()).await {
            Ok(result) => {
                self.record_outcome(&result);
                result.map_err(CallError::Inner)
            }
            Err(_) => {
                warn!(
                    breaker = self.config.name.as_str(),
                    timeout_ms = self.config.timeout.as_millis() as u64,
                    "Call timed out"
                );
                self.record(true);
                Err(CallError::Timeout {
                    name: self.config.name.clone(),
                    timeout: self.config.timeout,
                })
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Admit a call, moving an expired open breaker to half-open
    fn acquire<E>(&self) -> std::result::Result<(), CallError<E>> {
        let transition = {
            let mut inner = self.lock();
            match inner.state {
                CircuitState::Closed | CircuitState::HalfOpen => None,
                CircuitState::Open => {
                    let recovered = inner
                        .last_failure
                        .map_or(true, |at| at.elapsed() >= self.config.recovery_timeout);
                    if !recovered {
                        return Err(CallError::CircuitOpen {
                            name: self.config.name.clone(),
                        });
                    }
                    inner.successes = 0;
                    self.set_state(&mut inner, CircuitState::HalfOpen)
                }
            }
        };
        self.notify(transition);
        Ok(())
    }

    fn record_outcome<T, E: fmt::Display>(&self, result: &std::result::Result<T, E>) {
        let is_failure = match result {
            Ok(_) => false,
            Err(e) => !self.is_expected_failure(&e.to_string()),
        };
        self.record(is_failure);
    }

    fn is_expected_failure(&self, message: &str) -> bool {
        self.config
            .expected_failures
            .iter()
            .any(|expected| !expected.is_empty() && message.contains(expected.as_str()))
    }

    fn record(&self, is_failure: bool) {
        let transition = {
            let mut inner = self.lock();
            match inner.state {
                CircuitState::Closed => {
                    if is_failure {
                        inner.mark_failure();
                        if inner.failures >= self.config.failure_threshold {
                            self.set_state(&mut inner, CircuitState::Open)
                        } else {
                            None
                        }
                    } else {
                        inner.failures = 0;
                        None
                    }
                }
                CircuitState::HalfOpen => {
                    if is_failure {
                        inner.mark_failure();
                        self.set_state(&mut inner, CircuitState::Open)
                    } else {
                        inner.successes += 1;
                        if inner.successes >= self.config.success_threshold {
                            inner.failures = 0;
                            inner.successes = 0;
                            self.set_state(&mut inner, CircuitState::Closed)
                        } else {
                            None
                        }
                    }
                }
                // outcome of a call admitted before another caller opened the breaker
                CircuitState::Open => None,
            }
        };
        self.notify(transition);
    }

    fn set_state(&self, inner: &mut BreakerState, to: CircuitState) -> Transition {
        let from = inner.state;
        inner.state = to;

        match to {
            CircuitState::Open => warn!(
                breaker = self.config.name.as_str(),
                failures = inner.failures,
                from = %from,
                "Circuit opened"
            ),
            _ => debug!(
                breaker = self.config.name.as_str(),
                from = %from,
                to = %to,
                "Circuit state changed"
            ),
        }

        Some((from, to))
    }

    fn notify(&self, transition: Transition) {
        if let (Some(callback), Some((from, to))) = (&self.on_state_change, transition) {
            callback(&self.config.name, from, to);
        }
    }
}
