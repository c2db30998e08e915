//! The scheduled daily inventory report job.
//!
//! A run moves through [`PipelineStage`]s: fetch orders and inventory from a
//! [`ReportSource`], build the report with
//! [`invreport_core::build_daily_report`], and commit it to a [`ReportSink`].
//! [`ReportJob`] wraps the pipeline with overlap suppression, run
//! bookkeeping, and notifications; [`ReportScheduler`] fires it on a cron
//! cadence.

pub mod error;
pub mod export;
pub mod guard;
pub mod job;
pub mod ledger;
pub mod memory;
pub mod pipeline;
pub mod postgres;
pub mod scheduler;

pub use error::ReportError;
pub use export::{ExportingSink, FileExporter};
pub use guard::{RunGuard, RunPermit};
pub use job::{ReportJob, RunEvent, RunOutcome, TriggerSource};
pub use ledger::{NoopLedger, RunLedger};
pub use memory::MemoryReportSink;
pub use pipeline::{PipelineStage, ReportPipeline, ReportSink, ReportSource};
pub use postgres::{build_postgres_job, PgReportSink, PgReportSource, PgRunLedger};
pub use scheduler::{schedule_report_job, ReportScheduler, ScheduleHandle, SchedulerError};
