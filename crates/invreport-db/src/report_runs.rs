//! Database operations for the `report_runs` ledger.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `report_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReportRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub report_date: NaiveDate,
    /// `schedule`, `manual`, or `cli`.
    pub trigger_source: String,
    /// `running`, `succeeded`, `failed`, or `skipped`.
    pub status: String,
    pub failed_stage: Option<String>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

const SELECT_COLUMNS: &str = "id, public_id, report_date, trigger_source, status, failed_stage, \
     error_message, started_at, completed_at, created_at";

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Creates a new run in `running` status with `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn start_report_run(
    pool: &PgPool,
    report_date: NaiveDate,
    trigger_source: &str,
) -> Result<ReportRunRow, DbError> {
    let row = sqlx::query_as::<_, ReportRunRow>(&format!(
        "INSERT INTO report_runs (public_id, report_date, trigger_source, status) \
         VALUES ($1, $2, $3, 'running') \
         RETURNING {SELECT_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(report_date)
    .bind(trigger_source)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Records a trigger that was suppressed because another run was active.
///
/// The row is written already completed, in `skipped` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn record_skipped_run(
    pool: &PgPool,
    report_date: NaiveDate,
    trigger_source: &str,
) -> Result<ReportRunRow, DbError> {
    let row = sqlx::query_as::<_, ReportRunRow>(&format!(
        "INSERT INTO report_runs \
             (public_id, report_date, trigger_source, status, completed_at) \
         VALUES ($1, $2, $3, 'skipped', NOW()) \
         RETURNING {SELECT_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(report_date)
    .bind(trigger_source)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a run as `succeeded` and sets `completed_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `running`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn complete_report_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE report_runs \
         SET status = 'succeeded', completed_at = NOW() \
         WHERE id = $1 AND status = 'running'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a run as `failed`, recording the stage it failed in and the error.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `running`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn fail_report_run(
    pool: &PgPool,
    id: i64,
    failed_stage: &str,
    error_message: &str,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE report_runs \
         SET status = 'failed', completed_at = NOW(), failed_stage = $1, error_message = $2 \
         WHERE id = $3 AND status = 'running'",
    )
    .bind(failed_stage)
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks every run still `running` as `failed` with the message `abandoned`.
///
/// Only one process runs the job, so at startup any `running` row belongs to
/// a run that died with the previous process. Returns the number of rows
/// closed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn fail_abandoned_runs(pool: &PgPool) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE report_runs \
         SET status = 'failed', completed_at = NOW(), error_message = 'abandoned' \
         WHERE status = 'running'",
    )
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Fetches a single run by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_report_run(pool: &PgPool, id: i64) -> Result<ReportRunRow, DbError> {
    sqlx::query_as::<_, ReportRunRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM report_runs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns the most recent `limit` runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_report_runs(pool: &PgPool, limit: i64) -> Result<Vec<ReportRunRow>, DbError> {
    let rows = sqlx::query_as::<_, ReportRunRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM report_runs ORDER BY created_at DESC, id DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
