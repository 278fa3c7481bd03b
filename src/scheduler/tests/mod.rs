use super::*;
use crate::error::{Error, FetchError, PublishError};
use crate::promotions::PROMOTIONAL_POSTS;
use crate::publisher::{PostContent, Publisher};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Returns a fixed batch, or fails, and counts calls
#[derive(Default)]
struct StaticSource {
    articles: Vec<Article>,
    fail: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl ArticleSource for StaticSource {
    async fn fetch(&self, limit: NonZeroU32) -> Result<Vec<Article>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Fetch(FetchError::Status(503)));
        }
        Ok(self
            .articles
            .iter()
            .take(limit.get() as usize)
            .cloned()
            .collect())
    }
}

/// Fails post creation for scripted titles and records every attempt
#[derive(Default)]
struct ScriptedPublisher {
    /// Remaining failures per title; `u32::MAX` fails forever
    failures: StdMutex<HashMap<String, u32>>,
    attempts: StdMutex<Vec<(String, Instant)>>,
    next_id: AtomicUsize,
    /// Title whose create call takes this long to complete
    slow: Option<(String, Duration)>,
}

impl ScriptedPublisher {
    fn failing(title: &str, times: u32) -> Self {
        let publisher = Self::default();
        publisher
            .failures
            .lock()
            .unwrap()
            .insert(title.to_string(), times);
        publisher
    }

    fn stop_failing(&self) {
        self.failures.lock().unwrap().clear();
    }

    fn attempted_titles(&self) -> Vec<String> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .map(|(title, _)| title.clone())
            .collect()
    }

    fn attempt_times(&self, title: &str) -> Vec<Instant> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == title)
            .map(|(_, at)| *at)
            .collect()
    }
}

#[async_trait]
impl Publisher for ScriptedPublisher {
    async fn create_post(
        &self,
        _channel: &str,
        title: &str,
        _content: PostContent<'_>,
    ) -> Result<SubmissionId> {
        match &self.slow {
            Some((slow_title, delay)) if slow_title == title => tokio::time::sleep(*delay).await,
            _ => {}
        }

        self.attempts
            .lock()
            .unwrap()
            .push((title.to_string(), Instant::now()));

        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(title) {
            Some(remaining) if *remaining > 0 => {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                return Err(Error::Publish(PublishError::Status(503)));
            }
            _ => {}
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(SubmissionId::new(format!("id{n}")))
    }

    async fn reply(&self, parent: &SubmissionId, _text: &str) -> Result<SubmissionId> {
        Ok(SubmissionId::new(format!("{parent}-reply")))
    }
}

fn article(title: &str, link: &str) -> Article {
    Article {
        title: Some(title.to_string()),
        link: link.to_string(),
        ..Default::default()
    }
}

fn three_articles() -> Vec<Article> {
    vec![
        article("A1", "https://x/1"),
        article("A2", "https://x/2"),
        article("A3", "https://x/3"),
    ]
}

fn promo_titles() -> Vec<String> {
    PROMOTIONAL_POSTS.iter().map(|p| p.title.to_string()).collect()
}

fn expected_titles(articles: &[&str]) -> Vec<String> {
    let mut titles = promo_titles();
    titles.extend(articles.iter().map(|t| t.to_string()));
    titles
}

fn retry_every(secs: u64) -> RetryConfig {
    RetryConfig {
        error_delay: Duration::from_secs(secs),
        ..Default::default()
    }
}

fn build_scheduler(
    source: Arc<StaticSource>,
    publisher: Arc<ScriptedPublisher>,
    retry: RetryConfig,
) -> Scheduler {
    Scheduler::new(source, Submitter::new(publisher, "eodstockapi"), retry)
}

#[tokio::test]
async fn test_cycle_submits_promotions_then_articles_in_order() {
    let source = Arc::new(StaticSource {
        articles: three_articles(),
        ..Default::default()
    });
    let publisher = Arc::new(ScriptedPublisher::default());
    let scheduler = build_scheduler(source.clone(), publisher.clone(), RetryConfig::default());

    let report = scheduler.run_cycle().await;

    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(report.fetched, 3);
    assert_eq!(report.promotional, PROMOTIONAL_POSTS.len());
    assert_eq!(report.composed, 3);
    assert_eq!(report.submitted.len(), PROMOTIONAL_POSTS.len() + 3);
    assert_eq!(report.submit_attempts as usize, PROMOTIONAL_POSTS.len() + 3);
    assert_eq!(report.remaining, 0);
    assert!(!report.resumed);
    assert_eq!(
        publisher.attempted_titles(),
        expected_titles(&["A1", "A2", "A3"])
    );
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    assert_eq!(scheduler.state(), CycleState::Idle);
}

#[tokio::test]
async fn test_article_without_title_is_skipped() {
    let mut articles = three_articles();
    articles[1].title = None;
    let source = Arc::new(StaticSource {
        articles,
        ..Default::default()
    });
    let publisher = Arc::new(ScriptedPublisher::default());
    let scheduler = build_scheduler(source, publisher.clone(), RetryConfig::default());

    let report = scheduler.run_cycle().await;

    assert_eq!(report.compose_failures, 1);
    assert_eq!(report.composed, 2);
    assert_eq!(publisher.attempted_titles(), expected_titles(&["A1", "A3"]));
}

#[tokio::test]
async fn test_empty_fetch_submits_only_promotions() {
    let source = Arc::new(StaticSource::default());
    let publisher = Arc::new(ScriptedPublisher::default());
    let scheduler = build_scheduler(source, publisher.clone(), RetryConfig::default());

    let report = scheduler.run_cycle().await;

    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(report.fetched, 0);
    assert!(!report.fetch_failed);
    assert_eq!(publisher.attempted_titles(), promo_titles());
}

#[tokio::test]
async fn test_fetch_failure_still_submits_promotions() {
    let source = Arc::new(StaticSource {
        articles: three_articles(),
        fail: true,
        ..Default::default()
    });
    let publisher = Arc::new(ScriptedPublisher::default());
    let scheduler = build_scheduler(source, publisher.clone(), RetryConfig::default());

    let report = scheduler.run_cycle().await;

    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert!(report.fetch_failed);
    assert_eq!(report.fetched, 0);
    assert_eq!(publisher.attempted_titles(), promo_titles());
}

#[tokio::test]
async fn test_batch_limit_passed_to_source() {
    let source = Arc::new(StaticSource {
        articles: three_articles(),
        ..Default::default()
    });
    let publisher = Arc::new(ScriptedPublisher::default());
    let scheduler = build_scheduler(source, publisher.clone(), RetryConfig::default())
        .with_batch_limit(NonZeroU32::new(2).unwrap());

    let report = scheduler.run_cycle().await;

    assert_eq!(report.fetched, 2);
    assert_eq!(publisher.attempted_titles(), expected_titles(&["A1", "A2"]));
}

#[tokio::test(start_paused = true)]
async fn test_failed_post_retried_until_success_with_fixed_delay() {
    let source = Arc::new(StaticSource {
        articles: three_articles(),
        ..Default::default()
    });
    let publisher = Arc::new(ScriptedPublisher::failing("A2", 3));
    let scheduler = build_scheduler(source, publisher.clone(), retry_every(300));

    let report = scheduler.run_cycle().await;

    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(report.submitted.len(), PROMOTIONAL_POSTS.len() + 3);
    assert_eq!(report.submit_attempts as usize, PROMOTIONAL_POSTS.len() + 3 + 3);

    // Same post retried with the fixed delay between attempts
    let a2 = publisher.attempt_times("A2");
    assert_eq!(a2.len(), 4);
    for pair in a2.windows(2) {
        assert_eq!(pair[1] - pair[0], Duration::from_secs(300));
    }

    // Queue did not advance until A2 went through
    let titles = publisher.attempted_titles();
    let a3_index = titles.iter().position(|t| t == "A3").unwrap();
    let last_a2 = titles.iter().rposition(|t| t == "A2").unwrap();
    assert!(a3_index > last_a2);
}

#[tokio::test(start_paused = true)]
async fn test_default_retry_delay_is_five_minutes() {
    let source = Arc::new(StaticSource::default());
    let first_promo = PROMOTIONAL_POSTS[0].title;
    let publisher = Arc::new(ScriptedPublisher::failing(first_promo, 1));
    let scheduler = build_scheduler(source, publisher.clone(), RetryConfig::default());

    scheduler.run_cycle().await;

    let attempts = publisher.attempt_times(first_promo);
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[1] - attempts[0], Duration::from_secs(300));
}

#[tokio::test(start_paused = true)]
async fn test_max_attempts_dead_letters_and_advances() {
    let source = Arc::new(StaticSource {
        articles: three_articles(),
        ..Default::default()
    });
    let publisher = Arc::new(ScriptedPublisher::failing("A2", u32::MAX));
    let retry = RetryConfig {
        max_attempts: Some(2),
        ..retry_every(60)
    };
    let scheduler = build_scheduler(source, publisher.clone(), retry);

    let report = scheduler.run_cycle().await;

    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(report.dead_lettered.len(), 1);
    assert_eq!(report.dead_lettered[0].title(), "A2");
    assert!(!report.dead_lettered[0].is_submitted());
    assert_eq!(publisher.attempt_times("A2").len(), 2);
    assert_eq!(publisher.attempt_times("A3").len(), 1);
    assert_eq!(report.submitted.len(), PROMOTIONAL_POSTS.len() + 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_retry_wait_keeps_post_and_resumes() {
    let source = Arc::new(StaticSource {
        articles: three_articles(),
        ..Default::default()
    });
    let publisher = Arc::new(ScriptedPublisher::failing("A2", u32::MAX));
    let scheduler = Arc::new(build_scheduler(source.clone(), publisher.clone(), retry_every(300)));

    let stop = scheduler.cancellation_token().child_token();
    let handle = {
        let scheduler = scheduler.clone();
        let stop = stop.clone();
        tokio::spawn(async move { scheduler.run_cycle_until(&stop).await })
    };

    // Let the cycle reach the retry wait for A2
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(scheduler.state(), CycleState::Submitting);

    stop.cancel();
    let report = handle.await.unwrap();

    assert_eq!(report.outcome, CycleOutcome::Cancelled);
    assert_eq!(report.submitted.len(), PROMOTIONAL_POSTS.len() + 1);
    assert_eq!(report.remaining, 2);
    assert_eq!(scheduler.state(), CycleState::Idle);

    let pending: Vec<_> = scheduler
        .pending_posts()
        .await
        .iter()
        .map(|p| p.title().to_string())
        .collect();
    assert_eq!(pending, vec!["A2", "A3"]);

    // Next cycle resumes the leftover posts without fetching again
    publisher.stop_failing();
    let report = scheduler.run_cycle().await;

    assert!(report.resumed);
    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(report.submitted.len(), 2);
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    assert!(scheduler.pending_posts().await.is_empty());
}

#[tokio::test]
async fn test_cancelled_before_start_does_nothing() {
    let source = Arc::new(StaticSource {
        articles: three_articles(),
        ..Default::default()
    });
    let publisher = Arc::new(ScriptedPublisher::default());
    let cancel = CancellationToken::new();
    let scheduler = build_scheduler(source.clone(), publisher.clone(), RetryConfig::default())
        .with_cancellation(cancel.clone());

    cancel.cancel();
    let report = scheduler.run_cycle().await;

    assert_eq!(report.outcome, CycleOutcome::Cancelled);
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    assert!(publisher.attempted_titles().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_trigger_reports_busy() {
    let source = Arc::new(StaticSource {
        articles: three_articles(),
        ..Default::default()
    });
    let publisher = Arc::new(ScriptedPublisher::failing("A1", u32::MAX));
    let scheduler = Arc::new(build_scheduler(source.clone(), publisher, retry_every(300)));

    let handle = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run_cycle().await })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;

    let second = scheduler.run_cycle().await;
    assert_eq!(second.outcome, CycleOutcome::Busy);
    assert!(second.submitted.is_empty());
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    scheduler.cancellation_token().cancel();
    let first = handle.await.unwrap();
    assert_eq!(first.outcome, CycleOutcome::Cancelled);
}

#[test]
fn test_compose_posts_puts_promotions_first() {
    let mut articles: WorkQueue<Article> = three_articles().into_iter().collect();
    let mut posts = WorkQueue::new();
    let mut report = CycleReport::default();

    Scheduler::compose_posts(&mut articles, &mut posts, &mut report);

    let titles: Vec<_> = posts.iter().map(|p| p.title().to_string()).collect();
    assert_eq!(titles, expected_titles(&["A1", "A2", "A3"]));
    assert!(articles.is_empty());
    assert_eq!(
        posts.iter().nth(PROMOTIONAL_POSTS.len()).unwrap().self_text(),
        Some("A1\n https://x/1")
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_submit_lets_inflight_post_finish() {
    let source = Arc::new(StaticSource {
        articles: three_articles(),
        ..Default::default()
    });
    let publisher = Arc::new(ScriptedPublisher {
        slow: Some(("A2".to_string(), Duration::from_secs(30))),
        ..Default::default()
    });
    let scheduler = Arc::new(build_scheduler(source, publisher.clone(), retry_every(300)));

    let stop = scheduler.cancellation_token().child_token();
    let started = Instant::now();
    let handle = {
        let scheduler = scheduler.clone();
        let stop = stop.clone();
        tokio::spawn(async move { scheduler.run_cycle_until(&stop).await })
    };

    // A2's create call is still pending
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(publisher.attempt_times("A2").is_empty());

    stop.cancel();
    let report = handle.await.unwrap();

    assert_eq!(report.outcome, CycleOutcome::Cancelled);
    assert!(started.elapsed() >= Duration::from_secs(30));
    assert_eq!(report.submitted.len(), PROMOTIONAL_POSTS.len() + 2);
    assert_eq!(publisher.attempt_times("A2").len(), 1);
    assert!(publisher.attempt_times("A3").is_empty());
    assert_eq!(report.remaining, 1);

    let pending: Vec<_> = scheduler
        .pending_posts()
        .await
        .iter()
        .map(|p| p.title().to_string())
        .collect();
    assert_eq!(pending, vec!["A3"]);
}

#[tokio::test]
async fn test_attempt_counter_saturates() {
    let source = Arc::new(StaticSource::default());
    let publisher = Arc::new(ScriptedPublisher::default());
    let scheduler = build_scheduler(source, publisher, RetryConfig::default());

    let mut queue: WorkQueue<Post> = promotional_posts(Utc::now()).into_iter().collect();
    let mut report = CycleReport {
        submit_attempts: u32::MAX - 1,
        ..Default::default()
    };

    let outcome = scheduler
        .submit_posts(&mut queue, &mut report, &CancellationToken::new())
        .await;

    assert_eq!(outcome, CycleOutcome::Completed);
    assert_eq!(report.submit_attempts, u32::MAX);
    assert_eq!(report.submitted.len(), PROMOTIONAL_POSTS.len());
}

#[test]
fn test_delay_millis_saturates() {
    assert_eq!(delay_millis(Duration::from_secs(300)), 300_000);
    assert_eq!(delay_millis(Duration::MAX), u64::MAX);
}
