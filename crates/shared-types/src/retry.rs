//! # Retry Policy
//!
//! Exponential backoff for remote calls (chain reads, sink deliveries).
//! The delay before retry `n` (0-based) is `base_delay * 2^n`, capped at
//! `max_delay`. Each attempt is bounded by `call_timeout` when set.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

/// Backoff parameters for one class of remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Per-attempt timeout.
    pub call_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(60),
            call_timeout: Some(Duration::from_secs(10)),
        }
    }
}

impl RetryPolicy {
    /// Policy with the given attempt count and base delay.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Self::default()
        }
    }

    /// Single attempt, no backoff.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            call_timeout: None,
        }
    }

    /// Replace the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Delay to wait after failed attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Outcome of a call that never succeeded.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every attempt failed; carries the last error.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    /// The final attempt hit the per-call timeout.
    #[error("timed out after {attempts} attempts")]
    TimedOut { attempts: u32 },
}

enum Failure<E> {
    Error(E),
    Timeout(Duration),
}

impl<E: fmt::Display> fmt::Display for Failure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Error(e) => e.fmt(f),
            Failure::Timeout(limit) => write!(f, "timed out after {:?}", limit),
        }
    }
}

/// Run `call` until it succeeds or the policy is exhausted.
///
/// `operation` names the call in retry logs.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let attempts = policy.attempts();
    let mut last = None;

    for attempt in 0..attempts {
        let outcome = match policy.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, call()).await {
                Ok(result) => result.map_err(Failure::Error),
                Err(_) => Err(Failure::Timeout(limit)),
            },
            None => call().await.map_err(Failure::Error),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(failure) => {
                if attempt + 1 < attempts {
                    let delay = policy.delay_for(attempt);
                    warn!(
                        operation,
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %failure,
                        "Remote call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                last = Some(failure);
            }
        }
    }

    Err(match last {
        Some(Failure::Error(e)) => RetryError::Exhausted { attempts, last: e },
        _ => RetryError::TimedOut { attempts },
    })
}
