//! `report` command handlers.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use clap::Subcommand;
use invreport_core::{AppConfig, DailyReport};
use invreport_job::{
    MemoryReportSink, PgReportSource, ReportJob, ReportPipeline, RunOutcome, TriggerSource,
};
use sqlx::PgPool;

/// Sub-commands available under `report`.
#[derive(Debug, Subcommand)]
pub enum ReportCommands {
    /// Build and store the report for a date (default: yesterday)
    Run {
        /// Report date, YYYY-MM-DD
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Build from live data and print the result without storing it
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the stored report for a date
    Show {
        /// Report date, YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,
    },
    /// List the most recent stored reports
    List {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// List recent report runs from the run ledger
    Runs {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

/// Dispatch a `report` sub-command.
///
/// # Errors
///
/// Returns an error if a database query fails or a report run does not
/// complete.
pub(crate) async fn run(
    pool: &PgPool,
    config: &AppConfig,
    command: ReportCommands,
) -> anyhow::Result<()> {
    match command {
        ReportCommands::Run { date, dry_run } => run_report(pool, config, date, dry_run).await,
        ReportCommands::Show { date } => show_report(pool, date).await,
        ReportCommands::List { limit } => list_reports(pool, limit).await,
        ReportCommands::Runs { limit } => list_runs(pool, limit).await,
    }
}

async fn run_report(
    pool: &PgPool,
    config: &AppConfig,
    date: Option<NaiveDate>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let job = if dry_run {
        ReportJob::new(ReportPipeline::new(
            Arc::new(PgReportSource::new(pool.clone())),
            Arc::new(MemoryReportSink::new()),
            config.report_utc_offset,
            Duration::from_secs(config.report_stage_timeout_secs),
        ))
    } else {
        invreport_job::build_postgres_job(pool, config)
    };

    tracing::info!(?date, dry_run, "report run requested");
    let report = completed_report(job.trigger(date, TriggerSource::Cli).await)?;
    if dry_run {
        println!("{}", serde_json::to_string_pretty(&report)?);
        println!("dry-run: report for {} was not stored", report.report_date);
    } else {
        print!("{}", format_report(&report));
        println!("stored report for {}", report.report_date);
    }
    Ok(())
}

/// Log a run outcome and turn anything but completion into an error.
fn completed_report(outcome: RunOutcome) -> anyhow::Result<DailyReport> {
    match outcome {
        RunOutcome::Completed(report) => {
            tracing::info!(
                report_date = %report.report_date,
                total_orders = report.total_orders,
                total_revenue = %report.total_revenue,
                "report run complete"
            );
            Ok(report)
        }
        RunOutcome::Failed {
            report_date,
            stage,
            error,
        } => {
            tracing::error!(
                %report_date,
                %stage,
                code = error.code(),
                error = %error,
                "report run failed"
            );
            anyhow::bail!("report run for {report_date} failed while {stage}: {error}")
        }
        RunOutcome::Skipped { report_date } => {
            tracing::warn!(%report_date, "report run skipped: another run is in progress");
            anyhow::bail!("report run for {report_date} skipped: another run is in progress")
        }
    }
}

async fn show_report(pool: &PgPool, date: NaiveDate) -> anyhow::Result<()> {
    let Some(row) = invreport_db::get_daily_report(pool, date).await? else {
        println!("no report stored for {date}; run `report run --date {date}` first");
        return Ok(());
    };

    let updated_at = row.updated_at;
    let report = row.into_report()?;
    print!("{}", format_report(&report));
    println!(
        "last written {}",
        updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(())
}

async fn list_reports(pool: &PgPool, limit: i64) -> anyhow::Result<()> {
    let rows = invreport_db::list_daily_reports(pool, limit.max(1)).await?;
    if rows.is_empty() {
        println!("no reports stored yet");
        return Ok(());
    }

    println!(
        "{:<12}{:>8}{:>11}{:>14}{:>8}",
        "DATE", "ORDERS", "CANCELLED", "REVENUE", "UNITS"
    );
    for row in &rows {
        println!(
            "{:<12}{:>8}{:>11}{:>14}{:>8}",
            row.report_date.to_string(),
            row.total_orders,
            row.cancelled_orders,
            row.total_revenue.to_string(),
            row.units_sold
        );
    }
    Ok(())
}

async fn list_runs(pool: &PgPool, limit: i64) -> anyhow::Result<()> {
    let runs = invreport_db::list_report_runs(pool, limit.max(1)).await?;
    if runs.is_empty() {
        println!("no report runs recorded yet");
        return Ok(());
    }

    println!(
        "{:<12}{:<10}{:<11}{:<18}ERROR",
        "DATE", "SOURCE", "STATUS", "STARTED"
    );
    for run in &runs {
        let error = match (&run.failed_stage, &run.error_message) {
            (Some(stage), Some(message)) => format!("[{stage}] {message}"),
            (None, Some(message)) => message.clone(),
            _ => String::new(),
        };
        println!(
            "{:<12}{:<10}{:<11}{:<18}{}",
            run.report_date.to_string(),
            run.trigger_source,
            run.status,
            run.started_at.format("%Y-%m-%d %H:%M").to_string(),
            error
        );
    }
    Ok(())
}

/// Plain-text rendering of a report for terminal output.
fn format_report(report: &DailyReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "report date:      {}", report.report_date);
    let _ = writeln!(out, "orders:           {}", report.total_orders);
    let _ = writeln!(out, "cancelled orders: {}", report.cancelled_orders);
    let _ = writeln!(out, "revenue:          {}", report.total_revenue);
    let _ = writeln!(out, "units sold:       {}", report.units_sold);

    if !report.per_product.is_empty() {
        let _ = writeln!(out, "\n{:<20}{:>8}{:>14}", "PRODUCT", "UNITS", "REVENUE");
        for (product_id, sales) in &report.per_product {
            let _ = writeln!(
                out,
                "{:<20}{:>8}{:>14}",
                product_id,
                sales.units_sold,
                sales.revenue.to_string()
            );
        }
    }

    if report.low_stock.is_empty() {
        let _ = writeln!(out, "\nno products below reorder threshold");
    } else {
        let _ = writeln!(out, "\n{:<20}{:>8}{:>11}", "LOW STOCK", "STOCK", "THRESHOLD");
        for item in &report.low_stock {
            let _ = writeln!(
                out,
                "{:<20}{:>8}{:>11}",
                item.product_id, item.stock, item.reorder_threshold
            );
        }
    }

    out
}
