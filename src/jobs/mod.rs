//! Scheduled subscription lifecycle job.
//!
//! # Sweeps
//!
//! - **Auto-Renew**: active subscriptions past their expiry date with auto-renew
//!   enabled get a new expiry date one billing period from now
//!
//! - **Expire**: active subscriptions past their expiry date are set to 'expired'
//!
//! A tick runs both, renewals first, against a single "now" taken from the
//! scheduler's [`Clock`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use subkeeper::clock::SystemClock;
//! use subkeeper::jobs::{JobConfig, LifecycleScheduler};
//! use subkeeper::store::Database;
//!
//! let db = Database::from_config().await?;
//! let mut scheduler =
//!     LifecycleScheduler::new(db, Arc::new(SystemClock), JobConfig::default()).await?;
//! scheduler.start().await?;
//! ```

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::config::JobsConfig;
use crate::errors::KeeperError;
use crate::store::SubscriptionStore;

mod auto_renew;
mod expire_sweep;
mod policy;
mod tick;

pub use auto_renew::{run_auto_renew_sweep, RenewalOutcome, SkippedRenewal};
pub use expire_sweep::run_expire_sweep;
pub use policy::{decide, Transition};
pub use tick::{run_lifecycle_tick, TickReport};

/// Configuration for the lifecycle job.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Cron expression for the lifecycle tick (default: daily at midnight UTC)
    pub lifecycle_cron: String,
    /// Run one tick immediately on start (default: false)
    pub run_on_startup: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            lifecycle_cron: "0 0 0 * * *".to_string(),
            run_on_startup: false,
        }
    }
}

impl From<&JobsConfig> for JobConfig {
    fn from(config: &JobsConfig) -> Self {
        Self {
            lifecycle_cron: config.lifecycle_cron.clone(),
            run_on_startup: config.run_on_startup,
        }
    }
}

/// Owns the cron scheduler that fires lifecycle ticks.
pub struct LifecycleScheduler {
    scheduler: JobScheduler,
    store: Arc<dyn SubscriptionStore>,
    clock: Arc<dyn Clock>,
    config: JobConfig,
    /// Held for the duration of a tick
    running: Arc<Mutex<()>>,
    started: bool,
}

impl LifecycleScheduler {
    /// Create a new scheduler. Nothing runs until [`start`](Self::start).
    pub async fn new(
        store: Arc<dyn SubscriptionStore>,
        clock: Arc<dyn Clock>,
        config: JobConfig,
    ) -> Result<Self, JobError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        Ok(Self {
            scheduler,
            store,
            clock,
            config,
            running: Arc::new(Mutex::new(())),
            started: false,
        })
    }

    /// Register the lifecycle job and start firing it.
    pub async fn start(&mut self) -> Result<(), JobError> {
        if self.started {
            return Err(JobError::SchedulerError(
                "scheduler is already running".to_string(),
            ));
        }

        info!("Starting subscription lifecycle scheduler");

        if self.config.run_on_startup {
            log_tick_result(self.run_tick_now().await);
        }

        self.add_lifecycle_job().await?;

        self.scheduler
            .start()
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;
        self.started = true;

        info!("Subscription lifecycle scheduler started successfully");

        Ok(())
    }

    /// Stop firing ticks. A tick already in progress runs to completion.
    pub async fn shutdown(&mut self) -> Result<(), JobError> {
        if !self.started {
            return Ok(());
        }

        info!("Shutting down subscription lifecycle scheduler");
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;
        self.started = false;

        // Wait for an in-flight tick.
        let _idle = self.running.lock().await;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.started
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Run a tick immediately (manual triggers and tests).
    ///
    /// Fails with [`JobError::TickInProgress`] if a tick is already running.
    pub async fn run_tick_now(&self) -> Result<TickReport, JobError> {
        guarded_tick(&*self.store, &*self.clock, &self.running).await
    }

    async fn add_lifecycle_job(&self) -> Result<(), JobError> {
        let store = Arc::clone(&self.store);
        let clock = Arc::clone(&self.clock);
        let running = Arc::clone(&self.running);

        let job = Job::new_async(self.config.lifecycle_cron.as_str(), move |_uuid, _l| {
            let store = Arc::clone(&store);
            let clock = Arc::clone(&clock);
            let running = Arc::clone(&running);
            Box::pin(async move {
                info!("Running subscription lifecycle tick at {}", clock.now());
                log_tick_result(guarded_tick(&*store, &*clock, &running).await);
            })
        })
        .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        info!(
            "Added subscription lifecycle job (schedule: {})",
            self.config.lifecycle_cron
        );

        Ok(())
    }
}

async fn guarded_tick(
    store: &dyn SubscriptionStore,
    clock: &dyn Clock,
    running: &Mutex<()>,
) -> Result<TickReport, JobError> {
    let _running = running.try_lock().map_err(|_| JobError::TickInProgress)?;
    run_lifecycle_tick(store, clock.now()).await
}

/// Task-boundary logging: errors stop here.
fn log_tick_result(result: Result<TickReport, JobError>) {
    match result {
        Ok(report) if report.is_clean() => {
            if report.renewed > 0 || report.expired > 0 {
                info!(
                    "Lifecycle tick: {} renewed, {} expired",
                    report.renewed, report.expired
                );
            }
        }
        Ok(report) => {
            let ids: Vec<&str> = report
                .skipped
                .iter()
                .map(|s| s.subscription_id.as_str())
                .collect();
            warn!(
                skipped = ?ids,
                "Lifecycle tick: {} renewed, {} expired, {} renewals skipped",
                report.renewed,
                report.expired,
                ids.len()
            );
        }
        Err(JobError::TickInProgress) => {
            warn!("Lifecycle tick skipped: previous tick still running");
        }
        Err(e) => {
            error!("Lifecycle tick failed: {}", e);
        }
    }
}

/// Errors that can occur in the lifecycle job.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Scheduler error: {0}")]
    SchedulerError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Job execution error: {0}")]
    ExecutionError(String),

    #[error("A lifecycle tick is already running")]
    TickInProgress,
}

impl From<KeeperError> for JobError {
    fn from(err: KeeperError) -> Self {
        JobError::DatabaseError(err.to_string())
    }
}
