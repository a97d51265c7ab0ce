//! Exponential backoff for transient failures.

use crate::client::HttpError;
use kb_common_config::RetrySettings;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Outcome of a single attempt.
#[derive(Debug)]
pub enum Attempt<T, E> {
    Success(T),
    /// Transient failure; another attempt may succeed.
    Retryable(E),
    /// Permanent failure; returned as-is.
    Fatal(E),
}

impl<T, E: Retryable> From<Result<T, E>> for Attempt<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Attempt::Success(value),
            Err(e) if e.is_retryable() => Attempt::Retryable(e),
            Err(e) => Attempt::Fatal(e),
        }
    }
}

/// Errors that know whether they are transient.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for HttpError {
    fn is_retryable(&self) -> bool {
        HttpError::is_retryable(self)
    }
}

/// A retry about to be scheduled.
#[derive(Debug)]
pub struct RetryAttempt<'a, E> {
    /// 1-based number of the attempt that just failed.
    pub attempt: u32,
    pub total_attempts: u32,
    pub delay: Duration,
    pub error: &'a E,
}

impl<E: fmt::Display> RetryAttempt<'_, E> {
    fn log(&self) {
        warn!(
            attempt = self.attempt,
            total_attempts = self.total_attempts,
            delay_ms = self.delay.as_millis() as u64,
            error = %self.error,
            "Request failed, retrying"
        );
    }
}

/// Backoff parameters: up to `max_retries` retries after the first attempt,
/// sleeping `min(base_delay * 2^i, max_delay)` before retry `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self::new(settings.max_retries, settings.base_delay(), settings.max_delay())
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// A policy that runs the operation exactly once.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry `attempt` (0-indexed), saturating at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Run `operation`, retrying errors that report themselves as retryable.
    pub async fn execute<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        E: Retryable + fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_classified(|| {
            let fut = operation();
            async move { Attempt::from(fut.await) }
        })
        .await
    }

    /// Run `operation`, which classifies its own outcome.
    pub async fn execute_classified<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Attempt<T, E>>,
    {
        let total_attempts = self.total_attempts();
        let mut retries = 0;

        loop {
            let error = match operation().await {
                Attempt::Success(value) => return Ok(value),
                Attempt::Fatal(e) => return Err(e),
                Attempt::Retryable(e) => e,
            };

            if retries >= self.max_retries {
                if self.max_retries > 0 {
                    warn!(total_attempts, error = %error, "Retries exhausted");
                }
                return Err(error);
            }

            let delay = self.delay_for(retries);
            RetryAttempt {
                attempt: retries + 1,
                total_attempts,
                delay,
                error: &error,
            }
            .log();

            tokio::time::sleep(delay).await;
            retries += 1;
        }
    }
}

/// One-shot form of [`RetryPolicy::execute`].
pub async fn execute_with_retry<T, E, F, Fut>(
    operation: F,
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
) -> Result<T, E>
where
    E: Retryable + fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    RetryPolicy::new(max_retries, base_delay, max_delay)
        .execute(operation)
        .await
}
