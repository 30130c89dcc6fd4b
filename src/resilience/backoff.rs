//! Exponential and load-adaptive backoff
//!
//! [`ExponentialBackoff`] produces a capped, geometrically growing delay
//! sequence with optional jitter. [`AdaptiveBackoff`] scales that sequence by
//! a factor derived from system load samples.
//!
//! Backoff values are single-owner state. Share one across threads only
//! behind a mutex.

use crate::error::{CausewayError, Result};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound on any delay handed out by [`AdaptiveBackoff`]
pub const DEFAULT_ADAPTIVE_MAX_DELAY: Duration = Duration::from_secs(5 * 60);

/// Configuration for exponential backoff
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Ceiling for any single delay
    pub max_delay: Duration,
    /// Growth factor applied after every delay
    pub multiplier: f64,
    /// Scale each delay by a random factor in [0.75, 1.25]
    pub jitter: bool,
    /// Number of delays to hand out; `None` never runs out
    pub max_retries: Option<u32>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
            max_retries: Some(10),
        }
    }
}

impl BackoffConfig {
    /// Defaults overlaid with `CAUSEWAY_BACKOFF_*` environment variables
    ///
    /// Reads `INITIAL_DELAY_MS`, `MAX_DELAY_MS`, `MULTIPLIER`, `JITTER` and
    /// `MAX_RETRIES` (where `-1` means unlimited). The result is validated.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_vars(vars: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(ms) = parse_var::<u64>(&vars, "CAUSEWAY_BACKOFF_INITIAL_DELAY_MS")? {
            config.initial_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&vars, "CAUSEWAY_BACKOFF_MAX_DELAY_MS")? {
            config.max_delay = Duration::from_millis(ms);
        }
        if let Some(multiplier) = parse_var::<f64>(&vars, "CAUSEWAY_BACKOFF_MULTIPLIER")? {
            config.multiplier = multiplier;
        }
        if let Some(jitter) = parse_var::<bool>(&vars, "CAUSEWAY_BACKOFF_JITTER")? {
            config.jitter = jitter;
        }
        if let Some(retries) = parse_var::<i64>(&vars, "CAUSEWAY_BACKOFF_MAX_RETRIES")? {
            config.max_retries = match retries {
                -1 => None,
                n => Some(u32::try_from(n).map_err(|_| {
                    CausewayError::ConfigError(format!(
                        "CAUSEWAY_BACKOFF_MAX_RETRIES must be -1 or a non-negative count, got {}",
                        n
                    ))
                })?),
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would shrink or stall the delay sequence
    pub fn validate(&self) -> Result<()> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(CausewayError::ConfigError(format!(
                "backoff multiplier must be a finite value >= 1.0, got {}",
                self.multiplier
            )));
        }
        if self.max_delay < self.initial_delay {
            return Err(CausewayError::ConfigError(format!(
                "backoff max_delay {:?} is shorter than initial_delay {:?}",
                self.max_delay, self.initial_delay
            )));
        }
        Ok(())
    }
}

/// Look up `key` and parse it, trimming surrounding whitespace
pub(crate) fn parse_var<T>(vars: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match vars(key) {
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            CausewayError::ConfigError(format!("{} has invalid value '{}': {}", key, raw, e))
        }),
        None => Ok(None),
    }
}

/// Serializes tests that mutate the process environment
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Multiply a duration by a float, saturating at `cap`
fn scale(delay: Duration, factor: f64, cap: Duration) -> Duration {
    let nanos = (delay.as_nanos() as f64 * factor).round();
    if nanos.is_nan() || nanos >= cap.as_nanos() as f64 {
        cap
    } else if nanos <= 0.0 {
        Duration::ZERO
    } else {
        Duration::from_nanos(nanos as u64)
    }
}

/// Exponential backoff with optional jitter and a retry budget
///
/// Jitter is applied to the delay handed out, never to the tracked delay, so
/// randomness does not compound from one call to the next.
pub struct ExponentialBackoff {
    config: BackoffConfig,
    attempts: u32,
    last_delay: Duration,
    total_delay: Duration,
    rng: Box<dyn RngCore + Send>,
}

impl fmt::Debug for ExponentialBackoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExponentialBackoff")
            .field("config", &self.config)
            .field("attempts", &self.attempts)
            .field("last_delay", &self.last_delay)
            .field("total_delay", &self.total_delay)
            .finish_non_exhaustive()
    }
}

impl ExponentialBackoff {
    /// Create a backoff seeded from the operating system
    pub fn new(config: BackoffConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Create a backoff drawing jitter from `rng`
    pub fn with_rng(config: BackoffConfig, rng: impl RngCore + Send + 'static) -> Self {
        Self {
            last_delay: config.initial_delay,
            config,
            attempts: 0,
            total_delay: Duration::ZERO,
            rng: Box::new(rng),
        }
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// Return to the initial delay with a fresh retry budget
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.last_delay = self.config.initial_delay;
        self.total_delay = Duration::ZERO;
    }

    /// Next delay to wait, or `None` once the retry budget is spent
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }

        let mut delay = self.last_delay;
        if self.config.jitter {
            let factor = 0.75 + self.rng.random::<f64>() * 0.5;
            delay = scale(delay, factor, self.config.max_delay);
        }
        delay = delay.min(self.config.max_delay);

        self.last_delay = scale(self.last_delay, self.config.multiplier, self.config.max_delay);
        self.attempts += 1;
        self.total_delay = self.total_delay.saturating_add(delay);

        Some(delay)
    }

    /// Number of delays handed out since creation or the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn total_delay(&self) -> Duration {
        self.total_delay
    }

    pub fn should_retry(&self) -> bool {
        self.config.max_retries.map_or(true, |max| self.attempts < max)
    }
}

/// Backoff whose delays stretch under system load
#[derive(Debug)]
pub struct AdaptiveBackoff {
    base: ExponentialBackoff,
    load_factor: f64,
    max_delay: Duration,
}

impl AdaptiveBackoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self::from_backoff(ExponentialBackoff::new(config))
    }

    /// Wrap an existing backoff, e.g. one built with a seeded generator
    pub fn from_backoff(base: ExponentialBackoff) -> Self {
        Self {
            base,
            load_factor: 1.0,
            max_delay: DEFAULT_ADAPTIVE_MAX_DELAY,
        }
    }

    /// Override the absolute ceiling applied after load scaling
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Feed a load sample, with both usages given in percent
    ///
    /// Maps the normalized pressure `(cpu + mem) / 200` linearly onto
    /// `1 + 2 * pressure`, clamped to [0.5, 3.0].
    pub fn adjust_load_factor(&mut self, cpu_usage: f64, memory_usage: f64) {
        let pressure = (cpu_usage + memory_usage) / 200.0;
        let factor = 1.0 + pressure * 2.0;
        self.load_factor = if factor.is_nan() { 1.0 } else { factor.clamp(0.5, 3.0) };
    }

    pub fn load_factor(&self) -> f64 {
        self.load_factor
    }

    /// Base delay scaled by the load factor, or `None` once the budget is spent
    pub fn next_delay(&mut self) -> Option<Duration> {
        let delay = self.base.next_delay()?;
        Some(scale(delay, self.load_factor, self.max_delay))
    }

    pub fn attempts(&self) -> u32 {
        self.base.attempts()
    }

    pub fn reset(&mut self) {
        self.base.reset();
        self.load_factor = 1.0;
    }
}
