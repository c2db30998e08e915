use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::NaiveDate;
use invreport_core::DailyReport;

use crate::error::ReportError;
use crate::pipeline::ReportSink;

/// In-process sink keyed by report date. Backs `report run --dry-run` and
/// the job tests.
#[derive(Debug, Default)]
pub struct MemoryReportSink {
    reports: Mutex<BTreeMap<NaiveDate, DailyReport>>,
    commits: AtomicUsize,
}

impl MemoryReportSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, date: NaiveDate) -> Option<DailyReport> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&date)
            .cloned()
    }

    /// Number of distinct report dates stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total successful commits, counting replacements.
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportSink for MemoryReportSink {
    async fn commit(&self, report: &DailyReport) -> Result<(), ReportError> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(report.report_date, report.clone());
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
