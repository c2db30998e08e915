//! Database operations for the `daily_reports` table.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use invreport_core::{DailyReport, LowStockItem, ProductSales};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `daily_reports` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DailyReportRow {
    pub id: i64,
    pub report_date: NaiveDate,
    pub total_revenue: Decimal,
    pub total_orders: i64,
    pub cancelled_orders: i64,
    pub units_sold: i64,
    /// JSON object keyed by product id; see [`ProductSales`].
    pub per_product: Value,
    /// JSON array of [`LowStockItem`].
    pub low_stock: Value,
    pub generated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DailyReportRow {
    /// Decode the JSONB columns back into a [`DailyReport`].
    ///
    /// # Errors
    ///
    /// Returns [`DbError::MalformedReport`] if either JSON column does not
    /// match the report shape.
    pub fn into_report(self) -> Result<DailyReport, DbError> {
        let per_product: BTreeMap<String, ProductSales> = serde_json::from_value(self.per_product)?;
        let low_stock: Vec<LowStockItem> = serde_json::from_value(self.low_stock)?;
        Ok(DailyReport {
            report_date: self.report_date,
            total_revenue: self.total_revenue,
            total_orders: self.total_orders,
            cancelled_orders: self.cancelled_orders,
            units_sold: self.units_sold,
            per_product,
            low_stock,
            generated_at: self.generated_at,
        })
    }
}

const SELECT_COLUMNS: &str = "id, report_date, total_revenue, total_orders, cancelled_orders, \
     units_sold, per_product, low_stock, generated_at, created_at, updated_at";

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Insert the report, or replace the stored report for the same date.
///
/// Conflicts on `report_date` overwrite every aggregate column and bump
/// `updated_at`; `created_at` keeps the time of the first write. Returns the
/// stored row.
///
/// # Errors
///
/// Returns [`DbError::MalformedReport`] if the breakdown cannot be encoded,
/// or [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_daily_report(
    pool: &PgPool,
    report: &DailyReport,
) -> Result<DailyReportRow, DbError> {
    let per_product = serde_json::to_value(&report.per_product)?;
    let low_stock = serde_json::to_value(&report.low_stock)?;

    let row = sqlx::query_as::<_, DailyReportRow>(&format!(
        "INSERT INTO daily_reports \
             (report_date, total_revenue, total_orders, cancelled_orders, units_sold, \
              per_product, low_stock, generated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (report_date) DO UPDATE SET \
             total_revenue    = EXCLUDED.total_revenue, \
             total_orders     = EXCLUDED.total_orders, \
             cancelled_orders = EXCLUDED.cancelled_orders, \
             units_sold       = EXCLUDED.units_sold, \
             per_product      = EXCLUDED.per_product, \
             low_stock        = EXCLUDED.low_stock, \
             generated_at     = EXCLUDED.generated_at, \
             updated_at       = NOW() \
         RETURNING {SELECT_COLUMNS}"
    ))
    .bind(report.report_date)
    .bind(report.total_revenue)
    .bind(report.total_orders)
    .bind(report.cancelled_orders)
    .bind(report.units_sold)
    .bind(per_product)
    .bind(low_stock)
    .bind(report.generated_at)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetch the report for `report_date`, if one has been generated.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_daily_report(
    pool: &PgPool,
    report_date: NaiveDate,
) -> Result<Option<DailyReportRow>, DbError> {
    let row = sqlx::query_as::<_, DailyReportRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM daily_reports WHERE report_date = $1"
    ))
    .bind(report_date)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns the most recent `limit` reports, newest date first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_daily_reports(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<DailyReportRow>, DbError> {
    let rows = sqlx::query_as::<_, DailyReportRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM daily_reports ORDER BY report_date DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
