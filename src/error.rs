//! Error types and result aliases for the causeway library.
//!
//! This module defines the crate error type [`CausewayError`] and the [`Result`] type alias
//! used for decoding and configuration. Calls guarded by the resilience primitives keep the
//! caller's own error type and wrap it in [`CallError`] or [`RetryError`], so the original
//! cause always stays inspectable.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CausewayError {
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, CausewayError>;

/// Outcome of a call made through a [`CircuitBreaker`](crate::resilience::CircuitBreaker).
#[derive(Error, Debug)]
pub enum CallError<E> {
    /// The breaker refused the call without invoking the callable.
    #[error("circuit breaker {name} is open")]
    CircuitOpen { name: String },

    /// The per-call deadline elapsed before the callable finished.
    #[error("circuit breaker {name}: call timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    /// The callable itself failed.
    #[error(transparent)]
    Inner(E),
}

impl<E> CallError<E> {
    /// Returns true when the breaker rejected the call outright
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CallError::CircuitOpen { .. })
    }

    /// Returns the callable's error, if that is what failed
    pub fn into_inner(self) -> Option<E> {
        match self {
            CallError::Inner(e) => Some(e),
            _ => None,
        }
    }
}

/// Outcome of a retry loop that never produced a success.
#[derive(Error, Debug)]
pub enum RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// The backoff budget ran out; `source` is the error from the final attempt.
    #[error("operation failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: E,
    },

    /// The caller's cancellation signal fired before a success.
    #[error("operation cancelled after {attempts} attempts")]
    Cancelled { attempts: u32, last_error: Option<E> },
}

impl<E> RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// Number of times the operation was invoked
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } | RetryError::Cancelled { attempts, .. } => {
                *attempts
            }
        }
    }

    /// The last error returned by the operation, if it ran at all
    pub fn last_error(&self) -> Option<&E> {
        match self {
            RetryError::Exhausted { source, .. } => Some(source),
            RetryError::Cancelled { last_error, .. } => last_error.as_ref(),
        }
    }
}
