//! Retry logic with exponential backoff
//!
//! This module runs a fallible async operation until it succeeds, fails permanently, or
//! the backoff wait grows past the configured ceiling. The wait sequence is deterministic:
//! it starts at `min_wait` and doubles after every transient failure (1m, 2m, 4m, 8m, ...).
//!
//! # Example
//!
//! ```no_run
//! use dataset_dl::retry::{IsRetryable, run_with_retry};
//! use dataset_dl::config::RetryConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let policy = RetryConfig::default();
//! let cancel = CancellationToken::new();
//! run_with_retry(&policy, &cancel, || async {
//!     // Your operation here
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network errors, non-2xx responses, interrupted body copies) should
/// return `true`. Permanent failures (malformed naming patterns, a duplicate that cannot be
/// deleted, an alias that cannot be written) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;

    /// Returns true if the error only reports that the caller asked to stop
    fn is_cancellation(&self) -> bool {
        false
    }
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Transient
            Error::Request(_) | Error::HttpStatus { .. } | Error::Timeout { .. } => true,
            Error::BodyCopy { .. } | Error::Store(_) | Error::Io(_) => true,
            Error::SourceLog { .. } => true,
            // Permanent
            Error::DuplicateDelete { .. } | Error::AliasCopy { .. } => false,
            Error::MalformedSource { .. } | Error::Config { .. } => false,
            Error::Notify(_) | Error::Serialization(_) | Error::ApiServerError(_) => false,
            Error::Cancelled => false,
        }
    }

    fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// * A success returns immediately.
/// * A non-retryable error returns immediately after that single call.
/// * A retryable error is returned once the current wait is greater than
///   `policy.max_wait`; otherwise the executor sleeps for the current wait, doubles it and
///   calls `operation` again.
///
/// The comparison is strict, so a wait equal to `max_wait` is still slept and followed by one
/// more attempt. With `min_wait = max_wait = 0` the operation runs exactly twice.
///
/// Cancellation interrupts the sleep between attempts; the last error is returned and no
/// further attempt is made.
pub async fn run_with_retry<F, Fut, T, E>(
    policy: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt: u32 = 0;
    let mut wait = policy.min_wait;

    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_cancellation() => {
                tracing::info!(attempts = attempt, "Operation cancelled, shutdown requested");
                return Err(e);
            }
            Err(e) if !e.is_retryable() => {
                tracing::error!(error = %e, "Operation failed with non-retryable error");
                return Err(e);
            }
            Err(e) => {
                if wait > policy.max_wait {
                    tracing::error!(
                        error = %e,
                        attempts = attempt,
                        "Operation failed after all retry attempts exhausted"
                    );
                    return Err(e);
                }

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    wait_ms = wait.as_millis(),
                    "Operation failed, retrying"
                );

                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!(attempts = attempt, "Retry abandoned, shutdown requested");
                        return Err(e);
                    }
                    _ = tokio::time::sleep(wait) => {}
                }

                wait = next_wait(wait);
            }
        }
    }
}

/// Double the wait, with a 1ns floor so a zero starting wait still grows
fn next_wait(wait: Duration) -> Duration {
    wait.saturating_mul(2).max(Duration::from_nanos(1))
}
