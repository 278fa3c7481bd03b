//! Periodic cycle trigger
//!
//! Runs [`Scheduler::run_cycle`] once per configured interval until shutdown.
//!
//! # Features
//!
//! - Optional immediate cycle on start
//! - Cycles never overlap; ticks missed while a cycle runs are skipped
//! - Graceful shutdown through the scheduler's cancellation token
//!
//! # Example
//!
//! ```no_run
//! use eod_news_bot::{Config, Scheduler, SchedulerTask};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let shutdown = CancellationToken::new();
//! let scheduler = Arc::new(Scheduler::from_config(&config, shutdown.clone())?);
//!
//! let task = SchedulerTask::new(scheduler, config.scheduler.clone());
//! tokio::spawn(task.run());
//! # Ok(())
//! # }
//! ```

use crate::config::SchedulerConfig;
use crate::scheduler::{CycleOutcome, Scheduler};
use std::sync::Arc;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Background task that triggers scheduler cycles on an interval
pub struct SchedulerTask {
    scheduler: Arc<Scheduler>,
    config: SchedulerConfig,
    shutdown: CancellationToken,
}

impl SchedulerTask {
    /// Creates a task that stops when the scheduler's cancellation token fires
    pub fn new(scheduler: Arc<Scheduler>, config: SchedulerConfig) -> Self {
        let shutdown = scheduler.cancellation_token().clone();
        Self {
            scheduler,
            config,
            shutdown,
        }
    }

    /// Starts the trigger loop
    ///
    /// Returns once shutdown is requested. A cycle in progress at that point
    /// stops at its next safe point before this returns.
    pub async fn run(self) {
        info!(
            interval_secs = self.config.cycle_interval.as_secs(),
            run_on_start = self.config.run_on_start,
            "scheduler task started"
        );

        let mut ticker = interval(self.config.cycle_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // The first tick completes immediately
        if !self.config.run_on_start {
            ticker.tick().await;
        }

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let report = self.scheduler.run_cycle().await;
            match report.outcome {
                CycleOutcome::Busy => debug!("previous cycle still running"),
                CycleOutcome::Cancelled => break,
                CycleOutcome::Completed => {}
            }
        }

        info!("scheduler task stopped");
    }
}
