//! Postgres-backed source, sink, and run ledger.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use invreport_core::{AppConfig, DailyReport, InventoryItem, OrderRecord};
use invreport_db::DbError;
use sqlx::PgPool;

use crate::error::ReportError;
use crate::export::{ExportingSink, FileExporter};
use crate::job::{ReportJob, TriggerSource};
use crate::ledger::RunLedger;
use crate::pipeline::{ReportPipeline, ReportSink, ReportSource};

/// Assemble the report job against Postgres as configured: database source
/// and sink, optional file export, and the `report_runs` ledger.
pub fn build_postgres_job(pool: &PgPool, config: &AppConfig) -> ReportJob {
    let mut sink: Arc<dyn ReportSink> = Arc::new(PgReportSink::new(pool.clone()));
    if let Some(dir) = &config.report_export_dir {
        tracing::info!(dir = %dir.display(), "report job: file export enabled");
        sink = Arc::new(ExportingSink::new(sink, FileExporter::new(dir)));
    }

    let pipeline = ReportPipeline::new(
        Arc::new(PgReportSource::new(pool.clone())),
        sink,
        config.report_utc_offset,
        Duration::from_secs(config.report_stage_timeout_secs),
    );

    ReportJob::new(pipeline).with_ledger(Arc::new(PgRunLedger::new(pool.clone())))
}

/// Reads orders and inventory from the storefront tables.
#[derive(Debug, Clone)]
pub struct PgReportSource {
    pool: PgPool,
}

impl PgReportSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReportSource for PgReportSource {
    async fn fetch_orders(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<OrderRecord>, ReportError> {
        invreport_db::list_orders_in_window(&self.pool, start, end)
            .await
            .map_err(|e| unavailable("orders", &e))
    }

    async fn fetch_inventory(&self) -> Result<Vec<InventoryItem>, ReportError> {
        invreport_db::list_inventory(&self.pool)
            .await
            .map_err(|e| unavailable("inventory", &e))
    }
}

fn unavailable(what: &'static str, err: &DbError) -> ReportError {
    ReportError::data_unavailable(what, err)
}

/// Upserts reports into `daily_reports`.
#[derive(Debug, Clone)]
pub struct PgReportSink {
    pool: PgPool,
}

impl PgReportSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReportSink for PgReportSink {
    async fn commit(&self, report: &DailyReport) -> Result<(), ReportError> {
        let row = invreport_db::upsert_daily_report(&self.pool, report)
            .await
            .map_err(ReportError::persistence)?;
        tracing::debug!(
            report_date = %row.report_date,
            row_id = row.id,
            "report job: stored daily report"
        );
        Ok(())
    }
}

/// Records runs in the `report_runs` table.
#[derive(Debug, Clone)]
pub struct PgRunLedger {
    pool: PgPool,
}

impl PgRunLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunLedger for PgRunLedger {
    async fn begin(&self, report_date: NaiveDate, source: TriggerSource) -> Option<i64> {
        match invreport_db::start_report_run(&self.pool, report_date, source.as_str()).await {
            Ok(row) => Some(row.id),
            Err(e) => {
                tracing::warn!(
                    %report_date,
                    source = %source,
                    error = %e,
                    "report job: failed to record run start"
                );
                None
            }
        }
    }

    async fn succeeded(&self, run_id: i64) {
        if let Err(e) = invreport_db::complete_report_run(&self.pool, run_id).await {
            tracing::warn!(run_id, error = %e, "report job: failed to mark run succeeded");
        }
    }

    async fn failed(&self, run_id: i64, error: &ReportError) {
        let message = error.to_string();
        if let Err(e) =
            invreport_db::fail_report_run(&self.pool, run_id, error.stage().as_str(), &message)
                .await
        {
            tracing::warn!(
                run_id,
                error = %e,
                run_error = %message,
                "report job: failed to mark run failed"
            );
        }
    }

    async fn skipped(&self, report_date: NaiveDate, source: TriggerSource) {
        if let Err(e) =
            invreport_db::record_skipped_run(&self.pool, report_date, source.as_str()).await
        {
            tracing::warn!(
                %report_date,
                source = %source,
                error = %e,
                "report job: failed to record skipped run"
            );
        }
    }
}
