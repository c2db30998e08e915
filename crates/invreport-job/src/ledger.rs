//! Run bookkeeping.
//!
//! Ledger writes are best-effort: implementations swallow and log their own
//! failures so bookkeeping can never fail a report run.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::ReportError;
use crate::job::TriggerSource;

#[async_trait]
pub trait RunLedger: Send + Sync {
    /// Record that a run started. Returns an id to close it with, or `None`
    /// if the start could not be recorded.
    async fn begin(&self, report_date: NaiveDate, source: TriggerSource) -> Option<i64>;

    async fn succeeded(&self, run_id: i64);

    async fn failed(&self, run_id: i64, error: &ReportError);

    /// Record a trigger that was dropped because a run was already active.
    async fn skipped(&self, report_date: NaiveDate, source: TriggerSource);
}

/// Ledger that records nothing. Used by dry runs and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLedger;

#[async_trait]
impl RunLedger for NoopLedger {
    async fn begin(&self, _report_date: NaiveDate, _source: TriggerSource) -> Option<i64> {
        None
    }

    async fn succeeded(&self, _run_id: i64) {}

    async fn failed(&self, _run_id: i64, _error: &ReportError) {}

    async fn skipped(&self, _report_date: NaiveDate, _source: TriggerSource) {}
}
