//! Submission retry policy
//!
//! Failed submissions are retried against the same post after a fixed delay.
//! The wait is raced against a [`CancellationToken`] so shutdown can interrupt
//! it; an attempt that is already in flight is never interrupted because the
//! publishing call is not idempotent from the caller's side.
//!
//! # Example
//!
//! ```no_run
//! use eod_news_bot::config::RetryConfig;
//! use eod_news_bot::retry::{attempts_exhausted, retry_delay, wait_for_retry};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(mut try_once: impl FnMut() -> bool) {
//! let config = RetryConfig::default();
//! let cancel = CancellationToken::new();
//! let mut attempts = 0;
//! loop {
//!     attempts += 1;
//!     if try_once() || attempts_exhausted(&config, attempts) {
//!         break;
//!     }
//!     if !wait_for_retry(retry_delay(&config), &cancel).await {
//!         break; // shutdown requested
//!     }
//! }
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, FetchError, PublishError};
use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network timeouts, rate limits, server errors) return `true`.
/// Permanent failures (content rejected, bad credentials) return `false`.
///
/// The default submission policy retries regardless of this classification;
/// it is reported alongside every failure so operators can spot a post that
/// will never succeed.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Error::Publish(e) => e.is_retryable(),
            Error::Fetch(e) => e.is_retryable(),
            // Malformed input and bad settings do not fix themselves
            Error::Compose(_) => false,
            Error::Config { .. } => false,
            Error::Serialization(_) => false,
            Error::Other(_) => false,
        }
    }
}

impl IsRetryable for PublishError {
    fn is_retryable(&self) -> bool {
        match self {
            PublishError::RateLimited => true,
            PublishError::Status(code) => *code >= 500,
            // An expired token is refreshed on the next attempt
            PublishError::Unauthorized => true,
            PublishError::Auth(_) => false,
            PublishError::Rejected(_) => false,
            PublishError::MalformedResponse(_) => false,
        }
    }
}

impl IsRetryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Status(code) => *code >= 500 || *code == 429,
            FetchError::ContentType(_) => true,
            FetchError::Unsuccessful => true,
            FetchError::Decode(_) => false,
        }
    }
}

/// Whether a post that has failed `attempts` times should be given up on
///
/// Always false unless `max_attempts` is configured.
pub fn attempts_exhausted(config: &RetryConfig, attempts: u32) -> bool {
    config.max_attempts.is_some_and(|max| attempts >= max)
}

/// Delay before the next attempt, jittered if configured
pub fn retry_delay(config: &RetryConfig) -> Duration {
    if config.jitter {
        add_jitter(config.error_delay)
    } else {
        config.error_delay
    }
}

/// Sleep for `delay` unless cancelled first
///
/// Returns `true` when the delay elapsed and the caller should retry, `false`
/// when `cancel` fired during the wait.
pub async fn wait_for_retry(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => {
            tracing::info!("retry wait cancelled");
            false
        }
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// Jitter is uniformly distributed between 0% and 100% of the delay.
/// This means the actual delay will be between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    let jittered_secs = delay.as_secs_f64() * (1.0 + jitter_factor);
    Duration::from_secs_f64(jittered_secs)
}
