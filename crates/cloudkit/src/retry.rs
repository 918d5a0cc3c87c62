//! Retry logic with exponential backoff for transient errors.
//!
//! Reconciliation is idempotent, so a caller may re-run a whole pass after a
//! transient failure without risk of duplicating work.

use crate::types::RetryConfig;
use declarative::{ReconcileError, RemoteError};
use std::fmt;
use std::thread;

/// Errors that know whether another attempt may succeed.
pub trait Retryable: fmt::Display {
    fn is_retryable(&self) -> bool;
}

impl Retryable for crate::error::Error {
    fn is_retryable(&self) -> bool {
        self.is_retryable()
    }
}

impl Retryable for RemoteError {
    fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

impl Retryable for ReconcileError {
    fn is_retryable(&self) -> bool {
        self.is_retryable()
    }
}

/// Callback trait for retry progress notifications.
pub trait RetryCallback: Sync {
    /// Called when an operation is being retried.
    ///
    /// # Arguments
    /// * `attempt` - Attempt that just failed (1-indexed)
    /// * `max_attempts` - Maximum number of attempts
    /// * `error` - The error that triggered the retry
    /// * `delay_ms` - Milliseconds until next attempt
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &dyn fmt::Display, delay_ms: u64);
}

/// No-op callback that does nothing.
pub struct NoCallback;

impl RetryCallback for NoCallback {
    fn on_retry(&self, _attempt: u32, _max_attempts: u32, _error: &dyn fmt::Display, _delay_ms: u64) {
    }
}

/// Callback that logs retry information as warnings.
pub struct LogCallback;

impl RetryCallback for LogCallback {
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &dyn fmt::Display, delay_ms: u64) {
        log::warn!(
            "Attempt {}/{} failed: {}. Retrying in {}ms...",
            attempt,
            max_attempts,
            error,
            delay_ms
        );
    }
}

/// Execute an operation with retry logic.
///
/// Retries the operation if it returns a retryable error, using exponential
/// backoff between attempts. Non-retryable errors return immediately.
///
/// # Returns
/// The result of the operation, or the last error if all attempts failed.
pub fn with_retry<T, E, F>(
    config: &RetryConfig,
    callback: Option<&dyn RetryCallback>,
    mut operation: F,
) -> Result<T, E>
where
    E: Retryable,
    F: FnMut() -> Result<T, E>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation() {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !e.is_retryable() || attempt + 1 >= max_attempts {
                    return Err(e);
                }

                let delay = config.delay_for_attempt(attempt);
                if let Some(cb) = callback {
                    cb.on_retry(
                        attempt + 1,
                        max_attempts,
                        &e,
                        u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    );
                }

                thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}
