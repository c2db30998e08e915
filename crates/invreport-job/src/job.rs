use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use invreport_core::{previous_day, DailyReport};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::ReportError;
use crate::guard::RunGuard;
use crate::ledger::{NoopLedger, RunLedger};
use crate::pipeline::{PipelineStage, ReportPipeline};

const EVENT_CAPACITY: usize = 16;

/// What caused a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSource {
    Schedule,
    Manual,
    Cli,
}

impl TriggerSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerSource::Schedule => "schedule",
            TriggerSource::Manual => "manual",
            TriggerSource::Cli => "cli",
        }
    }
}

impl std::fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(DailyReport),
    Failed {
        report_date: NaiveDate,
        stage: PipelineStage,
        error: ReportError,
    },
    /// Another run held the guard; nothing was fetched or committed.
    Skipped { report_date: NaiveDate },
}

impl RunOutcome {
    #[must_use]
    pub fn report_date(&self) -> NaiveDate {
        match self {
            RunOutcome::Completed(report) => report.report_date,
            RunOutcome::Failed { report_date, .. } | RunOutcome::Skipped { report_date } => {
                *report_date
            }
        }
    }

    #[must_use]
    pub fn stage(&self) -> PipelineStage {
        match self {
            RunOutcome::Completed(_) => PipelineStage::Done,
            RunOutcome::Failed { .. } => PipelineStage::Failed,
            RunOutcome::Skipped { .. } => PipelineStage::Idle,
        }
    }
}

/// Broadcast after every trigger, including skipped ones.
#[derive(Debug, Clone)]
pub struct RunEvent {
    pub source: TriggerSource,
    pub outcome: RunOutcome,
}

/// The daily inventory report job.
///
/// At most one run is active at a time; a trigger that arrives while a run is
/// in progress is dropped and reported as [`RunOutcome::Skipped`]. The job
/// never panics or propagates a run failure to its caller, so a failed run
/// leaves the schedule intact.
pub struct ReportJob {
    pipeline: ReportPipeline,
    guard: RunGuard,
    ledger: Arc<dyn RunLedger>,
    events: broadcast::Sender<RunEvent>,
}

impl ReportJob {
    pub fn new(pipeline: ReportPipeline) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            pipeline,
            guard: RunGuard::new(),
            ledger: Arc::new(NoopLedger),
            events,
        }
    }

    #[must_use]
    pub fn with_ledger(mut self, ledger: Arc<dyn RunLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn pipeline(&self) -> &ReportPipeline {
        &self.pipeline
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.guard.is_running()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.events.subscribe()
    }

    /// The date a run reports on when none is given: the calendar day before
    /// now, in the pipeline's offset.
    #[must_use]
    pub fn default_report_date(&self) -> NaiveDate {
        previous_day(Utc::now(), self.pipeline.offset())
    }

    /// Run the report for `report_date` (or the previous day) unless a run is
    /// already active.
    ///
    /// Ledger writes share the pipeline's stage timeout. If the returned
    /// future is dropped mid-run, the run is closed as
    /// [`ReportError::Abandoned`] and the guard is released.
    pub async fn trigger(&self, report_date: Option<NaiveDate>, source: TriggerSource) -> RunOutcome {
        let report_date = report_date.unwrap_or_else(|| self.default_report_date());

        let Some(permit) = self.guard.try_acquire() else {
            tracing::warn!(
                %report_date,
                source = %source,
                stage = %self.pipeline.stage(),
                "report job: previous run still in progress; skipping trigger"
            );
            self.bounded_ledger("skipped", self.ledger.skipped(report_date, source))
                .await;
            return self.publish(source, RunOutcome::Skipped { report_date });
        };

        tracing::info!(%report_date, source = %source, "report job: run started");
        let run_id = self
            .bounded_ledger("begin", self.ledger.begin(report_date, source))
            .await
            .flatten();
        let mut active = ActiveRun {
            job: self,
            report_date,
            source,
            run_id,
            closed: false,
        };

        let result = self.pipeline.run(report_date).await;
        active.closed = true;

        let outcome = match result {
            Ok(report) => {
                tracing::info!(
                    %report_date,
                    total_orders = report.total_orders,
                    total_revenue = %report.total_revenue,
                    units_sold = report.units_sold,
                    low_stock = report.low_stock.len(),
                    "report job: run complete"
                );
                RunOutcome::Completed(report)
            }
            Err(error) => {
                tracing::error!(
                    %report_date,
                    stage = %error.stage(),
                    code = error.code(),
                    error = %error,
                    "report job: run failed; will retry at next scheduled time"
                );
                RunOutcome::Failed {
                    report_date,
                    stage: error.stage(),
                    error,
                }
            }
        };

        if let Some(id) = run_id {
            // Detached so the run is closed even if this future is dropped now.
            let close = tokio::spawn(close_run(
                self.ledger.clone(),
                id,
                outcome.clone(),
                self.pipeline.stage_timeout(),
            ));
            if let Err(e) = close.await {
                tracing::warn!(run_id = id, error = %e, "report job: ledger close task failed");
            }
        }

        drop(permit);
        self.publish(source, outcome)
    }

    /// Scheduled entry point: always reports on the previous day.
    pub async fn run_scheduled(&self) -> RunOutcome {
        self.trigger(None, TriggerSource::Schedule).await
    }

    async fn bounded_ledger<T>(
        &self,
        call: &'static str,
        write: impl Future<Output = T>,
    ) -> Option<T> {
        bounded(call, self.pipeline.stage_timeout(), write).await
    }

    fn publish(&self, source: TriggerSource, outcome: RunOutcome) -> RunOutcome {
        // No subscribers is fine.
        let _ = self.events.send(RunEvent {
            source,
            outcome: outcome.clone(),
        });
        outcome
    }
}

/// A run that has started but whose pipeline has not returned yet.
struct ActiveRun<'a> {
    job: &'a ReportJob,
    report_date: NaiveDate,
    source: TriggerSource,
    run_id: Option<i64>,
    closed: bool,
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }

        let stage = self.job.pipeline.abandon();
        let error = ReportError::Abandoned { stage };
        tracing::warn!(
            report_date = %self.report_date,
            source = %self.source,
            %stage,
            "report job: run dropped before finishing"
        );

        if let Some(id) = self.run_id {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(close_run(
                        self.job.ledger.clone(),
                        id,
                        RunOutcome::Failed {
                            report_date: self.report_date,
                            stage,
                            error: error.clone(),
                        },
                        self.job.pipeline.stage_timeout(),
                    ));
                }
                Err(_) => {
                    tracing::warn!(run_id = id, "report job: no runtime to close abandoned run");
                }
            }
        }

        self.job.publish(
            self.source,
            RunOutcome::Failed {
                report_date: self.report_date,
                stage,
                error,
            },
        );
    }
}

async fn close_run(
    ledger: Arc<dyn RunLedger>,
    run_id: i64,
    outcome: RunOutcome,
    timeout: Duration,
) {
    match outcome {
        RunOutcome::Completed(_) => {
            bounded("succeeded", timeout, ledger.succeeded(run_id)).await;
        }
        RunOutcome::Failed { error, .. } => {
            bounded("failed", timeout, ledger.failed(run_id, &error)).await;
        }
        RunOutcome::Skipped { .. } => {}
    }
}

async fn bounded<T>(
    call: &'static str,
    timeout: Duration,
    write: impl Future<Output = T>,
) -> Option<T> {
    match tokio::time::timeout(timeout, write).await {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(
                call,
                ?timeout,
                "report job: run ledger write timed out; continuing without it"
            );
            None
        }
    }
}
