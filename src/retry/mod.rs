//! Bounded retry with backoff for remote calls

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Returned once every attempt of an operation has failed
#[derive(Error, Debug)]
#[error("{operation} gave up after {attempts} attempts: {source}")]
pub struct RetryExhausted<E> {
    pub operation: &'static str,
    pub attempts: u32,
    #[source]
    pub source: E,
}

/// Delay schedule and attempt bound for [`retry`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    initial_delay: Duration,
    backoff: f64,
    max_delay: Duration,
    max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 1.0, Duration::from_secs(10), 10)
    }
}

impl RetryPolicy {
    /// `backoff` below 1.0 is treated as 1.0 and `max_attempts` as at least 1,
    /// so delays never shrink and at least one call is always made.
    pub fn new(initial_delay: Duration, backoff: f64, max_delay: Duration, max_attempts: u32) -> Self {
        let backoff = if backoff.is_finite() && backoff >= 1.0 {
            backoff
        } else {
            1.0
        };

        Self {
            initial_delay: initial_delay.min(max_delay),
            backoff,
            max_delay,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.backoff.powi(attempt.saturating_sub(1).min(i32::MAX as u32) as i32);
        let secs = self.initial_delay.as_secs_f64() * factor;

        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// The full sleep schedule between attempts
    #[cfg(test)]
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..self.max_attempts).map(move |attempt| self.delay_after(attempt))
    }
}

/// Run `op` until it succeeds or `policy.max_attempts()` calls have failed.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut op: F,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!("[Retry] {} succeeded on attempt {}", operation, attempt);
                }
                return Ok(value);
            }
            Err(e) if attempt >= policy.max_attempts => {
                tracing::error!(
                    "[Retry] {} failed on final attempt {}: {}",
                    operation,
                    attempt,
                    e
                );
                return Err(RetryExhausted {
                    operation,
                    attempts: attempt,
                    source: e,
                });
            }
            Err(e) => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    "[Retry] {} failed (attempt {}/{}): {} ... retrying in {:?}",
                    operation,
                    attempt,
                    policy.max_attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
