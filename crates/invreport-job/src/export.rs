//! File export of committed reports (JSON and CSV).

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use invreport_core::DailyReport;
use serde::Serialize;

use crate::error::ReportError;
use crate::pipeline::ReportSink;

/// Writes `inventory-report-<date>.json` and `.csv` into a directory.
///
/// Each file is written to a temporary sibling and renamed into place, so a
/// reader never sees a partially written export.
#[derive(Debug, Clone)]
pub struct FileExporter {
    dir: PathBuf,
}

impl FileExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn json_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("inventory-report-{date}.json"))
    }

    #[must_use]
    pub fn csv_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("inventory-report-{date}.csv"))
    }

    /// Write both export files, returning their paths.
    ///
    /// The write runs on the blocking pool and cannot be interrupted. If this
    /// future is dropped (for example by the commit timeout), files not yet
    /// renamed into place are discarded; one already renamed stays.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::PersistenceError`] if either file cannot be
    /// written.
    pub async fn export(&self, report: &DailyReport) -> Result<Vec<PathBuf>, ReportError> {
        let exporter = self.clone();
        let report = report.clone();
        let cancel = CancelOnDrop::default();
        let cancelled = Arc::clone(&cancel.0);
        tokio::task::spawn_blocking(move || exporter.write_all(&report, &cancelled))
            .await
            .map_err(|e| ReportError::persistence(format!("export task failed: {e}")))?
    }

    fn write_all(
        &self,
        report: &DailyReport,
        cancelled: &AtomicBool,
    ) -> Result<Vec<PathBuf>, ReportError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            ReportError::persistence(format!("create {}: {e}", self.dir.display()))
        })?;

        let json_path = self.json_path(report.report_date);
        let json = serde_json::to_vec_pretty(report).map_err(ReportError::persistence)?;
        write_atomically(&json_path, &json, cancelled)?;

        let csv_path = self.csv_path(report.report_date);
        let csv = render_csv(report)?;
        write_atomically(&csv_path, &csv, cancelled)?;

        Ok(vec![json_path, csv_path])
    }
}

#[derive(Serialize)]
struct CsvRow<'a> {
    report_date: NaiveDate,
    product_id: &'a str,
    units_sold: i64,
    revenue: String,
    stock: Option<i64>,
    reorder_threshold: Option<i64>,
    low_stock: bool,
}

/// One row per product that sold or is low on stock, sorted by product id.
fn render_csv(report: &DailyReport) -> Result<Vec<u8>, ReportError> {
    let mut product_ids: Vec<&str> = report
        .per_product
        .keys()
        .map(String::as_str)
        .chain(report.low_stock.iter().map(|i| i.product_id.as_str()))
        .collect();
    product_ids.sort_unstable();
    product_ids.dedup();

    let mut writer = csv::Writer::from_writer(Vec::new());
    for product_id in product_ids {
        let sales = report.per_product.get(product_id);
        let low = report.low_stock.iter().find(|i| i.product_id == product_id);
        writer
            .serialize(CsvRow {
                report_date: report.report_date,
                product_id,
                units_sold: sales.map_or(0, |s| s.units_sold),
                revenue: sales.map_or_else(|| "0".to_string(), |s| s.revenue.to_string()),
                stock: low.map(|i| i.stock),
                reorder_threshold: low.map(|i| i.reorder_threshold),
                low_stock: low.is_some(),
            })
            .map_err(ReportError::persistence)?;
    }

    writer
        .into_inner()
        .map_err(|e| ReportError::persistence(e.error()))
}

/// Raises its flag when dropped, i.e. when the awaiting future goes away.
#[derive(Default)]
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

fn write_atomically(
    path: &Path,
    contents: &[u8],
    cancelled: &AtomicBool,
) -> Result<(), ReportError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));

    let write = || -> std::io::Result<()> {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
        if cancelled.load(Ordering::SeqCst) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Interrupted,
                "export cancelled",
            ));
        }
        std::fs::rename(&tmp, path)
    };

    write().map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        ReportError::persistence(format!("write {}: {e}", path.display()))
    })
}

/// Commits to an inner sink, then exports the same report to files.
///
/// The export runs only after the inner commit succeeds. An export failure
/// fails the run even though the inner sink already holds the report; the
/// next run's upsert overwrites both. When the commit timeout fires during
/// the export, the blocking write finishes in the background but does not
/// rename any further file into place.
pub struct ExportingSink {
    inner: Arc<dyn ReportSink>,
    exporter: FileExporter,
}

impl ExportingSink {
    pub fn new(inner: Arc<dyn ReportSink>, exporter: FileExporter) -> Self {
        Self { inner, exporter }
    }
}

#[async_trait]
impl ReportSink for ExportingSink {
    async fn commit(&self, report: &DailyReport) -> Result<(), ReportError> {
        self.inner.commit(report).await?;
        let paths = self.exporter.export(report).await?;
        tracing::info!(
            report_date = %report.report_date,
            files = ?paths,
            "report job: exported report files"
        );
        Ok(())
    }
}
