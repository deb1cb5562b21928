//! Bounded retry with exponential backoff and a wall-clock budget.
//!
//! Whether an error is worth retrying is decided by [`retry_policy`], a pure
//! function of the [`ErrorKind`]. Fatal errors return after a single attempt;
//! retryable ones are retried until the budget runs out.
//!
//! # Example
//! ```ignore
//! let outcome = retry_with_budget(&RetryConfig::default(), "delete frontend", || async {
//!     reconciler.delete("lb-1", 42).await
//! })
//! .await?;
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{ErrorKind, FrontendError};

/// Default wall-clock budget for eventually-consistent operations.
pub const DEFAULT_RETRY_BUDGET: Duration = Duration::from_secs(5 * 60);

/// What to do with a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    Retry,
    Fail,
}

/// Only transient remote conditions are retried.
pub fn retry_policy(kind: ErrorKind) -> RetryPolicy {
    match kind {
        ErrorKind::Retryable => RetryPolicy::Retry,
        ErrorKind::NotFound
        | ErrorKind::RemoteRejected
        | ErrorKind::Conflict
        | ErrorKind::Denied
        | ErrorKind::Inconsistent
        | ErrorKind::InvalidSpec
        | ErrorKind::InvalidRequest
        | ErrorKind::Decode => RetryPolicy::Fail,
    }
}

/// Errors that know their retry policy.
pub trait Classify {
    fn retry_policy(&self) -> RetryPolicy;
}

impl Classify for FrontendError {
    fn retry_policy(&self) -> RetryPolicy {
        retry_policy(self.kind())
    }
}

/// Backoff schedule and budget.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total wall-clock time allowed, measured from the first attempt
    pub budget: Duration,
    /// Delay after the first failed attempt
    pub initial_delay: Duration,
    /// Cap for exponential growth
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            budget: DEFAULT_RETRY_BUDGET,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    pub fn with_budget(budget: Duration) -> Self {
        Self {
            budget,
            ..Default::default()
        }
    }
}

/// Failure of a retried operation.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The operation failed with a non-retryable error; no budget was consumed.
    #[error("{0}")]
    Fatal(E),

    /// Every attempt failed with a retryable error until the budget ran out.
    #[error("gave up after {attempts} attempts in {elapsed:?}: {last}")]
    Exhausted {
        attempts: u32,
        elapsed: Duration,
        last: E,
    },
}

impl<E> RetryError<E> {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    /// The error of the last attempt.
    pub fn last(&self) -> &E {
        match self {
            RetryError::Fatal(e) => e,
            RetryError::Exhausted { last, .. } => last,
        }
    }

    pub fn into_inner(self) -> E {
        match self {
            RetryError::Fatal(e) => e,
            RetryError::Exhausted { last, .. } => last,
        }
    }
}

/// Run `operation` until it succeeds, fails fatally or the budget is spent.
///
/// No attempt starts after the deadline, and the wrapper never sleeps past it:
/// when the next backoff delay would cross the deadline it gives up right away.
pub async fn retry_with_budget<T, E, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + Display,
{
    let start = Instant::now();
    let deadline = start + config.budget;
    let mut attempts = 0u32;

    let mut delays = ExponentialBuilder::default()
        .with_min_delay(config.initial_delay)
        .with_max_delay(config.max_delay)
        .with_factor(2.0)
        .with_jitter()
        .build();

    loop {
        attempts += 1;

        let err = match operation().await {
            Ok(value) => {
                if attempts > 1 {
                    debug!(operation = %operation_name, attempts, "Operation succeeded after retries");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if err.retry_policy() == RetryPolicy::Fail {
            debug!(operation = %operation_name, attempt = attempts, error = %err, "Operation failed, not retryable");
            return Err(RetryError::Fatal(err));
        }

        let now = Instant::now();
        let delay = delays.next().unwrap_or(config.max_delay);
        if now + delay >= deadline {
            warn!(
                operation = %operation_name,
                attempts,
                budget_secs = config.budget.as_secs(),
                error = %err,
                "Retry budget exhausted"
            );
            return Err(RetryError::Exhausted {
                attempts,
                elapsed: now - start,
                last: err,
            });
        }

        warn!(
            operation = %operation_name,
            attempt = attempts,
            error = %err,
            delay_ms = delay.as_millis(),
            "Operation failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}
