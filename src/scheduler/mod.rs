//! Cron scheduler for the recurring fetch jobs.
//!
//! Thin wrapper over `tokio_cron_scheduler::JobScheduler`: named jobs, one
//! cron expression each, all firing in the configured timezone. Firings of a
//! single job never overlap: the next one waits on a per-job mutex until
//! the previous run finishes. Job errors are logged inside the task and
//! never reach the scheduler; a failed cycle simply waits for its next
//! scheduled firing.

use std::future::Future;
use std::sync::Arc;

use chrono_tz::Tz;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::error::Result;

pub struct Scheduler {
    inner: JobScheduler,
    timezone: Tz,
}

impl Scheduler {
    pub async fn new(timezone: Tz) -> Result<Self> {
        Ok(Self {
            inner: JobScheduler::new().await?,
            timezone,
        })
    }

    /// Register a named recurring job. `cron` is a 6-field expression
    /// (seconds first) evaluated in the scheduler's timezone.
    pub async fn add_job<F, Fut>(&self, name: &'static str, cron: &str, task: F) -> Result<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task = Arc::new(task);
        let lock = Arc::new(Mutex::new(()));

        let job = Job::new_async_tz(cron, self.timezone, move |_uuid, _scheduler| {
            let task = task.clone();
            let lock = lock.clone();
            Box::pin(async move {
                let _guard = lock.lock().await;
                task().await;
            })
        })?;

        self.inner.add(job).await?;
        tracing::info!(job = name, cron, "registered job");
        Ok(())
    }

    /// Begin firing due jobs.
    pub async fn start(&self) -> Result<()> {
        self.inner.start().await?;
        Ok(())
    }

    /// Cancel future firings and stop the dispatch loop.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}
