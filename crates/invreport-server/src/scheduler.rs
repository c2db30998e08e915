//! Background job scheduler.
//!
//! Registers the daily inventory report at the configured cadence and starts
//! the scheduler.

use std::sync::Arc;

use invreport_core::AppConfig;
use invreport_job::{schedule_report_job, ReportJob, ReportScheduler, SchedulerError};

/// Builds and starts the scheduler, or returns `None` when scheduling is
/// disabled by config.
///
/// The returned handle must be kept alive for the lifetime of the process.
///
/// # Errors
///
/// Returns [`SchedulerError`] if the scheduler cannot be initialised, the
/// cron expression is rejected, or the scheduler fails to start.
pub async fn build_scheduler(
    job: Arc<ReportJob>,
    config: &AppConfig,
) -> Result<Option<ReportScheduler>, SchedulerError> {
    if !config.scheduler_enabled {
        tracing::info!("scheduler: disabled; reports run only on manual trigger");
        return Ok(None);
    }

    let scheduler = ReportScheduler::new().await?;
    schedule_report_job(&scheduler, &config.report_cron, job).await?;
    scheduler.start().await?;
    Ok(Some(scheduler))
}
