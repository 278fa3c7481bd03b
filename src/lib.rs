//! # eod-news-bot
//!
//! Fetches financial news articles from the EOD Stock API, turns them into
//! Reddit posts and submits them one at a time, retrying each failed post until
//! it goes through.
//!
//! ## Pipeline
//!
//! - [`source`] pulls a bounded batch of articles
//! - [`composer`] turns each article into a [`Post`]
//! - [`promotions`] supplies evergreen posts submitted ahead of the news
//! - [`publisher`] submits posts to a subreddit
//! - [`scheduler`] runs the fetch → compose → submit cycle
//! - [`scheduler_task`] triggers cycles on an interval
//!
//! ## Quick Start
//!
//! ```no_run
//! use eod_news_bot::{Config, Scheduler, SchedulerTask, run_with_shutdown};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let shutdown = CancellationToken::new();
//!     let scheduler = Arc::new(Scheduler::from_config(&config, shutdown.clone())?);
//!
//!     let task = tokio::spawn(SchedulerTask::new(scheduler, config.scheduler.clone()).run());
//!
//!     run_with_shutdown(shutdown).await;
//!     task.await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Article to post composition
pub mod composer;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Evergreen promotional posts
pub mod promotions;
/// Post submission
pub mod publisher;
/// FIFO work queue
pub mod queue;
/// Retry policy helpers
pub mod retry;
/// Cycle orchestration
pub mod scheduler;
/// Periodic cycle trigger
pub mod scheduler_task;
/// News article source
pub mod source;
/// Core domain types
pub mod types;

// Re-export commonly used types
pub use config::{Config, ContentApiConfig, RedditConfig, RetryConfig, SchedulerConfig};
pub use error::{ComposeError, Error, FetchError, PublishError, Result};
pub use publisher::{PostContent, Publisher, RedditClient, SubmitOutcome, Submitter};
pub use queue::WorkQueue;
pub use scheduler::{CycleOutcome, CycleReport, Scheduler};
pub use scheduler_task::SchedulerTask;
pub use source::{ArticleSource, EodNewsClient};
pub use types::{Article, CycleState, Post, PostBody, SubmissionId};

/// Wait for a termination signal, then cancel `shutdown`.
///
/// Cancelling stops any running cycle at its next safe point; posts not yet
/// submitted stay queued.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(shutdown: tokio_util::sync::CancellationToken) {
    wait_for_signal().await;
    shutdown.cancel();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("received SIGTERM, shutting down");
                }
                _ = sigint.recv() => {
                    tracing::info!("received SIGINT, shutting down");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("received SIGINT, shutting down");
            } else {
                tracing::error!("could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("received SIGTERM, shutting down");
            } else {
                tracing::error!("could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("received Ctrl+C, shutting down");
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to listen for Ctrl+C signal");
        }
    }
}
