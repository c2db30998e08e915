//! Cron registration for the report job.
//!
//! Cron expressions use six fields (sec min hour dom month dow) and are
//! evaluated in UTC.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use uuid::Uuid;

use crate::job::ReportJob;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler error: {0}")]
    Scheduler(#[from] JobSchedulerError),
}

/// Identifies one registered task so it can be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleHandle(Uuid);

impl ScheduleHandle {
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.0
    }
}

/// Thin wrapper over [`JobScheduler`].
///
/// Each fire runs the task on its own tokio task, so a panicking task is
/// logged and the registration keeps firing.
pub struct ReportScheduler {
    inner: JobScheduler,
}

impl ReportScheduler {
    /// # Errors
    ///
    /// Returns [`SchedulerError`] if the underlying scheduler cannot be created.
    pub async fn new() -> Result<Self, SchedulerError> {
        Ok(Self {
            inner: JobScheduler::new().await?,
        })
    }

    /// Register `task` to run at every fire time of `cron`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError`] if `cron` does not parse or the job cannot
    /// be added.
    pub async fn schedule<F, Fut>(&self, cron: &str, task: F) -> Result<ScheduleHandle, SchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task = Arc::new(task);
        let cron_label: Arc<str> = Arc::from(cron);

        let job = Job::new_async(cron, move |job_id, _lock| {
            let task = Arc::clone(&task);
            let cron_label = Arc::clone(&cron_label);
            Box::pin(async move {
                if let Err(e) = tokio::spawn(task()).await {
                    tracing::error!(
                        %job_id,
                        cron = %cron_label,
                        error = %e,
                        "scheduler: scheduled task aborted; registration kept"
                    );
                }
            })
        })?;

        let id = self.inner.add(job).await?;
        Ok(ScheduleHandle(id))
    }

    /// Remove a registration. Fires already in flight run to completion.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError`] if the scheduler rejects the removal.
    pub async fn cancel(&self, handle: ScheduleHandle) -> Result<(), SchedulerError> {
        self.inner.remove(&handle.0).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`SchedulerError`] if the scheduler cannot start.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        self.inner.start().await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`SchedulerError`] if shutdown fails.
    pub async fn stop(&mut self) -> Result<(), SchedulerError> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

/// Register the daily report job on `scheduler`.
///
/// # Errors
///
/// Returns [`SchedulerError`] if the cron expression is invalid or the job
/// cannot be registered.
pub async fn schedule_report_job(
    scheduler: &ReportScheduler,
    cron: &str,
    job: Arc<ReportJob>,
) -> Result<ScheduleHandle, SchedulerError> {
    let handle = scheduler
        .schedule(cron, move || {
            let job = Arc::clone(&job);
            async move {
                tracing::info!("scheduler: starting daily inventory report");
                let outcome = job.run_scheduled().await;
                tracing::info!(
                    report_date = %outcome.report_date(),
                    stage = %outcome.stage(),
                    "scheduler: daily inventory report finished"
                );
            }
        })
        .await?;

    tracing::info!(cron, job_id = %handle.id(), "scheduler: registered daily inventory report");
    Ok(handle)
}
