//! The fetch → build → commit pipeline for one report date.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use invreport_core::{
    build_daily_report, DailyReport, InventoryItem, OrderRecord, ReportWindow,
};
use serde::Serialize;
use tokio::sync::watch;

use crate::error::ReportError;

/// Where a run currently is. `Done` and `Failed` are terminal for that run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    Fetching,
    Building,
    Committing,
    Done,
    Failed,
}

impl PipelineStage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Fetching => "fetching",
            PipelineStage::Building => "building",
            PipelineStage::Committing => "committing",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read side: orders for a window and the current inventory.
#[async_trait]
pub trait ReportSource: Send + Sync {
    /// Orders placed in `[start, end)`.
    async fn fetch_orders(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<OrderRecord>, ReportError>;

    async fn fetch_inventory(&self) -> Result<Vec<InventoryItem>, ReportError>;
}

/// Write side: durable storage keyed by report date.
///
/// `commit` must be an upsert: committing a report for a date that already
/// has one replaces it.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn commit(&self, report: &DailyReport) -> Result<(), ReportError>;
}

/// Runs the report stages against a source and sink.
///
/// The pipeline itself does not guard against concurrent runs; that is the
/// job of [`crate::RunGuard`]. Stage changes are published on a watch
/// channel.
pub struct ReportPipeline {
    source: Arc<dyn ReportSource>,
    sink: Arc<dyn ReportSink>,
    offset: FixedOffset,
    stage_timeout: Duration,
    stage_tx: watch::Sender<PipelineStage>,
}

impl ReportPipeline {
    pub fn new(
        source: Arc<dyn ReportSource>,
        sink: Arc<dyn ReportSink>,
        offset: FixedOffset,
        stage_timeout: Duration,
    ) -> Self {
        let (stage_tx, _) = watch::channel(PipelineStage::Idle);
        Self {
            source,
            sink,
            offset,
            stage_timeout,
            stage_tx,
        }
    }

    /// Offset that defines the report's calendar day.
    #[must_use]
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    #[must_use]
    pub fn stage(&self) -> PipelineStage {
        *self.stage_tx.borrow()
    }

    pub fn watch_stage(&self) -> watch::Receiver<PipelineStage> {
        self.stage_tx.subscribe()
    }

    /// Upper bound on each I/O stage.
    #[must_use]
    pub fn stage_timeout(&self) -> Duration {
        self.stage_timeout
    }

    /// Mark the current run failed without finishing it. Used when a run is
    /// dropped mid-stage.
    pub(crate) fn abandon(&self) -> PipelineStage {
        self.stage_tx.send_replace(PipelineStage::Failed)
    }

    /// Fetch, build, and commit the report for `date`.
    ///
    /// Nothing is committed unless both fetches and the build succeed.
    ///
    /// # Errors
    ///
    /// Returns the [`ReportError`] of the first stage that failed.
    pub async fn run(&self, date: NaiveDate) -> Result<DailyReport, ReportError> {
        let window = ReportWindow::for_date(date, self.offset);
        let result = self.run_stages(&window).await;
        self.stage_tx.send_replace(if result.is_ok() {
            PipelineStage::Done
        } else {
            PipelineStage::Failed
        });
        result
    }

    async fn run_stages(&self, window: &ReportWindow) -> Result<DailyReport, ReportError> {
        self.stage_tx.send_replace(PipelineStage::Fetching);
        let (orders, inventory) = tokio::try_join!(
            self.bounded_fetch("orders", self.source.fetch_orders(window.start, window.end)),
            self.bounded_fetch("inventory", self.source.fetch_inventory()),
        )?;
        tracing::debug!(
            report_date = %window.date,
            orders = orders.len(),
            inventory = inventory.len(),
            "report job: fetched source data"
        );

        self.stage_tx.send_replace(PipelineStage::Building);
        let report = match build_daily_report(window, &orders, &inventory, Utc::now()) {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(
                    report_date = %window.date,
                    error = %e,
                    ?orders,
                    ?inventory,
                    "report job: builder rejected input"
                );
                return Err(e.into());
            }
        };

        self.stage_tx.send_replace(PipelineStage::Committing);
        match tokio::time::timeout(self.stage_timeout, self.sink.commit(&report)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ReportError::persistence(format!(
                    "commit timed out after {:?}",
                    self.stage_timeout
                )))
            }
        }

        Ok(report)
    }

    async fn bounded_fetch<T>(
        &self,
        what: &'static str,
        fetch: impl Future<Output = Result<T, ReportError>>,
    ) -> Result<T, ReportError> {
        match tokio::time::timeout(self.stage_timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(ReportError::data_unavailable(
                what,
                format!("timed out after {:?}", self.stage_timeout),
            )),
        }
    }
}
