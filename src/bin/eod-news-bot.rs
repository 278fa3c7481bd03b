//! Runs the news pipeline on a fixed interval until SIGINT/SIGTERM.
//!
//! Configuration comes from the environment (see [`eod_news_bot::Config::from_env`]);
//! `RUST_LOG` controls log verbosity.

use eod_news_bot::{Config, Scheduler, SchedulerTask, run_with_shutdown};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("eod_news_bot=info".parse()?))
        .init();

    let config = Config::from_env()?;
    info!(
        subreddit = %config.reddit.subreddit,
        batch_limit = config.content.batch_limit,
        cycle_interval_secs = config.scheduler.cycle_interval.as_secs(),
        error_delay_secs = config.retry.error_delay.as_secs(),
        max_attempts = ?config.retry.max_attempts,
        "eod-news-bot starting"
    );

    let shutdown = CancellationToken::new();
    let scheduler = Arc::new(Scheduler::from_config(&config, shutdown.clone())?);
    let task = tokio::spawn(SchedulerTask::new(scheduler.clone(), config.scheduler.clone()).run());

    run_with_shutdown(shutdown).await;
    task.await?;

    let unsent = scheduler.pending_posts().await.len();
    if unsent > 0 {
        tracing::warn!(unsent, "stopped with posts still queued");
    }
    info!("eod-news-bot stopped");
    Ok(())
}
