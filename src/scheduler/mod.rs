//! Fetch → compose → submit cycle orchestration.
//!
//! One call to [`Scheduler::run_cycle`] moves through
//! `Idle → Fetching → Composing → Submitting → Idle`:
//!
//! - **Fetching** pulls one bounded batch from the [`ArticleSource`] into the
//!   pending-articles queue, in response order. A failed fetch is logged and the
//!   cycle continues with no articles.
//! - **Composing** enqueues the promotional posts first, then drains the
//!   pending-articles queue through the composer. Articles that fail to compose
//!   are logged and skipped.
//! - **Submitting** drains the pending-posts queue through the [`Submitter`]. A
//!   failed submission is retried against the same post after the configured
//!   delay, indefinitely unless `max_attempts` is set; the queue does not advance
//!   until the head post succeeds.
//!
//! Stages never overlap and nothing is parallelized: the publishing platform
//! enforces per-account rate limits.
//!
//! The pending-posts queue outlives a cycle only when the cycle was cancelled.
//! A cycle that starts with leftover posts skips fetching and composing and
//! resumes submitting them.
//!
//! # Known limitation
//!
//! With the default unbounded retry, a post the platform permanently rejects
//! blocks every post queued behind it until the process is stopped.

use crate::composer;
use crate::config::{Config, RetryConfig};
use crate::error::Result;
use crate::promotions::promotional_posts;
use crate::publisher::{RedditClient, SubmitOutcome, Submitter};
use crate::queue::WorkQueue;
use crate::retry::{IsRetryable, attempts_exhausted, retry_delay, wait_for_retry};
use crate::source::{ArticleSource, EodNewsClient};
use crate::types::{Article, CycleState, Post, SubmissionId};
use chrono::Utc;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Default number of articles requested per cycle
pub const DEFAULT_BATCH_LIMIT: NonZeroU32 = match NonZeroU32::new(50) {
    Some(limit) => limit,
    None => unreachable!(),
};

/// How a cycle ended
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Pending-posts queue fully drained
    #[default]
    Completed,
    /// Shutdown requested; unsent posts remain queued
    Cancelled,
    /// Another cycle was already running; nothing was done
    Busy,
}

/// Summary of one cycle
#[derive(Clone, Debug, Default)]
pub struct CycleReport {
    /// How the cycle ended
    pub outcome: CycleOutcome,
    /// Cycle resumed posts left over from a cancelled cycle instead of fetching
    pub resumed: bool,
    /// Articles returned by the source
    pub fetched: usize,
    /// The fetch failed and the cycle continued without articles
    pub fetch_failed: bool,
    /// Promotional posts enqueued
    pub promotional: usize,
    /// Article posts enqueued
    pub composed: usize,
    /// Articles skipped because they could not be composed
    pub compose_failures: usize,
    /// Ids of posts submitted this cycle, in submission order
    pub submitted: Vec<SubmissionId>,
    /// Total submission attempts, including retries
    pub submit_attempts: u32,
    /// Media posts whose follow-up reply failed
    pub reply_failures: usize,
    /// Posts dropped after exhausting `max_attempts`
    pub dead_lettered: Vec<Post>,
    /// Posts still queued when the cycle ended
    pub remaining: usize,
}

impl CycleReport {
    fn busy() -> Self {
        Self {
            outcome: CycleOutcome::Busy,
            ..Default::default()
        }
    }
}

/// Resets the published state to `Idle` however the cycle exits
struct IdleOnDrop<'a>(&'a watch::Sender<CycleState>);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.send_replace(CycleState::Idle);
    }
}

/// Runs fetch → compose → submit cycles
pub struct Scheduler {
    source: Arc<dyn ArticleSource>,
    submitter: Submitter,
    batch_limit: NonZeroU32,
    retry: RetryConfig,
    cancel: CancellationToken,
    /// Held for the whole cycle; `try_lock` failing means a cycle is running
    pending_posts: Mutex<WorkQueue<Post>>,
    state: watch::Sender<CycleState>,
}

impl Scheduler {
    /// Create a scheduler with the default batch limit and a fresh cancellation token
    pub fn new(source: Arc<dyn ArticleSource>, submitter: Submitter, retry: RetryConfig) -> Self {
        let (state, _) = watch::channel(CycleState::Idle);
        Self {
            source,
            submitter,
            batch_limit: DEFAULT_BATCH_LIMIT,
            retry,
            cancel: CancellationToken::new(),
            pending_posts: Mutex::new(WorkQueue::new()),
            state,
        }
    }

    /// Build the news and Reddit clients from `config` and wire them up
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or an HTTP client cannot be created
    pub fn from_config(config: &Config, cancel: CancellationToken) -> Result<Self> {
        config.validate()?;
        let source = Arc::new(EodNewsClient::new(&config.content)?);
        let publisher = Arc::new(RedditClient::new(&config.reddit)?);
        let submitter = Submitter::new(publisher, config.reddit.subreddit.clone());

        Ok(Self::new(source, submitter, config.retry.clone())
            .with_batch_limit(config.content.limit()?)
            .with_cancellation(cancel))
    }

    /// Set the number of articles requested per cycle
    pub fn with_batch_limit(mut self, limit: NonZeroU32) -> Self {
        self.batch_limit = limit;
        self
    }

    /// Use `cancel` to stop cycles at the next safe point
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops cycles when cancelled
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Current cycle state
    pub fn state(&self) -> CycleState {
        *self.state.borrow()
    }

    /// Watch cycle state changes
    pub fn subscribe_state(&self) -> watch::Receiver<CycleState> {
        self.state.subscribe()
    }

    /// Snapshot of posts still waiting to be submitted
    ///
    /// Waits for a running cycle to finish.
    pub async fn pending_posts(&self) -> Vec<Post> {
        self.pending_posts.lock().await.iter().cloned().collect()
    }

    /// Run one full cycle
    ///
    /// Returns once the pending-posts queue is drained, or at the next safe point
    /// after cancellation. Fetch, compose and submission failures are handled
    /// inside the cycle and only show up in the report.
    pub async fn run_cycle(&self) -> CycleReport {
        self.run_cycle_until(&self.cancel).await
    }

    /// Run one full cycle that stops early when `cancel` fires
    ///
    /// Pass a child of [`Self::cancellation_token`] to stop a single cycle without
    /// shutting the scheduler down; unsent posts are resumed by the next cycle.
    pub async fn run_cycle_until(&self, cancel: &CancellationToken) -> CycleReport {
        let Ok(mut pending_posts) = self.pending_posts.try_lock() else {
            info!("cycle already in progress, skipping trigger");
            return CycleReport::busy();
        };
        let _idle = IdleOnDrop(&self.state);
        let mut report = CycleReport::default();

        if cancel.is_cancelled() {
            report.outcome = CycleOutcome::Cancelled;
            report.remaining = pending_posts.len();
            return report;
        }

        if pending_posts.is_empty() {
            self.state.send_replace(CycleState::Fetching);
            let mut pending_articles = self.fetch_articles(&mut report).await;

            self.state.send_replace(CycleState::Composing);
            Self::compose_posts(&mut pending_articles, &mut pending_posts, &mut report);
        } else {
            report.resumed = true;
            info!(
                remaining = pending_posts.len(),
                "resuming unsent posts from a previous cycle"
            );
        }

        self.state.send_replace(CycleState::Submitting);
        report.outcome = self.submit_posts(&mut pending_posts, &mut report, cancel).await;
        report.remaining = pending_posts.len();

        info!(
            outcome = ?report.outcome,
            fetched = report.fetched,
            composed = report.composed,
            compose_failures = report.compose_failures,
            submitted = report.submitted.len(),
            attempts = report.submit_attempts,
            dead_lettered = report.dead_lettered.len(),
            remaining = report.remaining,
            "cycle finished"
        );
        report
    }

    async fn fetch_articles(&self, report: &mut CycleReport) -> WorkQueue<Article> {
        let mut pending_articles = WorkQueue::new();
        match self.source.fetch(self.batch_limit).await {
            Ok(articles) => {
                report.fetched = articles.len();
                info!(count = articles.len(), "fetched articles");
                pending_articles.extend(articles);
            }
            Err(e) => {
                report.fetch_failed = true;
                warn!(
                    error = %e,
                    transient = e.is_retryable(),
                    "article fetch failed, continuing with no articles"
                );
            }
        }
        pending_articles
    }

    /// Enqueue promotional posts, then every article that composes cleanly
    fn compose_posts(
        pending_articles: &mut WorkQueue<Article>,
        pending_posts: &mut WorkQueue<Post>,
        report: &mut CycleReport,
    ) {
        let promos = promotional_posts(Utc::now());
        report.promotional = promos.len();
        pending_posts.extend(promos);

        while let Some(article) = pending_articles.pop() {
            match composer::compose(&article) {
                Ok(post) => {
                    debug!(title = post.title(), "composed post");
                    pending_posts.push(post);
                    report.composed += 1;
                }
                Err(e) => {
                    report.compose_failures += 1;
                    warn!(
                        uuid = article.uuid.as_deref().unwrap_or("-"),
                        link = %article.link,
                        error = %e,
                        "skipping article"
                    );
                }
            }
        }
    }

    /// Drain the queue, retrying the head post until it is submitted
    async fn submit_posts(
        &self,
        pending_posts: &mut WorkQueue<Post>,
        report: &mut CycleReport,
        cancel: &CancellationToken,
    ) -> CycleOutcome {
        loop {
            if cancel.is_cancelled() {
                info!(
                    remaining = pending_posts.len(),
                    "shutdown requested, stopping before next post"
                );
                return CycleOutcome::Cancelled;
            }
            let Some(mut post) = pending_posts.pop() else {
                return CycleOutcome::Completed;
            };

            let mut attempts: u32 = 0;
            loop {
                attempts = attempts.saturating_add(1);
                report.submit_attempts = report.submit_attempts.saturating_add(1);

                match self.submitter.submit_detailed(&mut post).await {
                    SubmitOutcome::Submitted { id, reply_failed } => {
                        if attempts > 1 {
                            info!(attempts, id = %id, "post submitted after retry");
                        }
                        if reply_failed {
                            report.reply_failures += 1;
                        }
                        report.submitted.push(id);
                        break;
                    }
                    SubmitOutcome::Failed { retryable } => {
                        if attempts_exhausted(&self.retry, attempts) {
                            error!(
                                title = post.title(),
                                attempts,
                                transient = retryable,
                                "giving up on post after all retry attempts exhausted"
                            );
                            report.dead_lettered.push(post);
                            break;
                        }

                        let delay = retry_delay(&self.retry);
                        warn!(
                            title = post.title(),
                            attempt = attempts,
                            delay_ms = delay_millis(delay),
                            transient = retryable,
                            "submission failed, retrying same post"
                        );

                        if !wait_for_retry(delay, cancel).await {
                            pending_posts.requeue_front(post);
                            return CycleOutcome::Cancelled;
                        }
                    }
                }
            }
        }
    }
}

fn delay_millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
