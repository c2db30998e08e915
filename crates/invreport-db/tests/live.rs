//! Live integration tests for invreport-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/invreport-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use invreport_core::{build_daily_report, DailyReport, OrderStatus, ReportWindow};
use invreport_db::{
    complete_report_run, fail_abandoned_runs, fail_report_run, get_daily_report, get_report_run,
    list_daily_reports, list_inventory, list_orders_in_window, list_report_runs,
    record_skipped_run, start_report_run, upsert_daily_report, DbError,
};
use rust_decimal::Decimal;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn report_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 5, 4).unwrap()
}

fn window() -> ReportWindow {
    ReportWindow::for_date(report_date(), FixedOffset::east_opt(0).unwrap())
}

/// Insert a product and return its generated `id`.
async fn insert_product(
    pool: &sqlx::PgPool,
    sku: &str,
    stock: i32,
    threshold: i32,
    is_active: bool,
) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO products (sku, name, stock, reorder_threshold, is_active) \
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(sku)
    .bind(format!("Product {sku}"))
    .bind(stock)
    .bind(threshold)
    .bind(is_active)
    .fetch_one(pool)
    .await
    .unwrap_or_else(|e| panic!("insert_product failed for sku '{sku}': {e}"))
}

/// Insert an order with a single line and return its generated `id`.
async fn insert_order(
    pool: &sqlx::PgPool,
    product_id: i64,
    quantity: i32,
    amount: Decimal,
    status: &str,
    placed_at: DateTime<Utc>,
) -> i64 {
    let order_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO orders (public_id, status, total, placed_at) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(status)
    .bind(amount)
    .bind(placed_at)
    .fetch_one(pool)
    .await
    .expect("insert order");

    sqlx::query(
        "INSERT INTO order_items (order_id, product_id, quantity, amount) VALUES ($1, $2, $3, $4)",
    )
    .bind(order_id)
    .bind(product_id)
    .bind(quantity)
    .bind(amount)
    .execute(pool)
    .await
    .expect("insert order item");

    order_id
}

fn sample_report(total_orders: i64) -> DailyReport {
    let mut report = DailyReport::empty(report_date(), Utc::now());
    report.total_orders = total_orders;
    report.total_revenue = Decimal::from(total_orders * 10);
    report
}

// ---------------------------------------------------------------------------
// Orders and inventory
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn list_orders_in_window_returns_only_orders_in_range(pool: sqlx::PgPool) {
    let product = insert_product(&pool, "A", 1, 5, true).await;
    let noon = Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap();
    insert_order(&pool, product, 3, Decimal::from(30), "fulfilled", noon).await;
    insert_order(&pool, product, 2, Decimal::from(20), "placed", noon).await;
    insert_order(&pool, product, 9, Decimal::from(90), "fulfilled", window().end).await;
    insert_order(
        &pool,
        product,
        4,
        Decimal::from(40),
        "fulfilled",
        window().start - chrono::TimeDelta::seconds(1),
    )
    .await;

    let orders = list_orders_in_window(&pool, window().start, window().end)
        .await
        .expect("list orders");

    assert_eq!(orders.len(), 2);
    assert!(orders.iter().all(|o| o.lines.len() == 1));
    assert!(orders.iter().all(|o| o.lines[0].product_id == "A"));
    assert!(orders.iter().any(|o| o.status == OrderStatus::Placed));
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_orders_in_window_on_empty_day_is_empty(pool: sqlx::PgPool) {
    let orders = list_orders_in_window(&pool, window().start, window().end)
        .await
        .expect("list orders");
    assert!(orders.is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_inventory_skips_inactive_products(pool: sqlx::PgPool) {
    insert_product(&pool, "B", 10, 2, true).await;
    insert_product(&pool, "A", 1, 5, true).await;
    insert_product(&pool, "Z", 0, 5, false).await;

    let items = list_inventory(&pool).await.expect("list inventory");

    let skus: Vec<&str> = items.iter().map(|i| i.product_id.as_str()).collect();
    assert_eq!(skus, vec!["A", "B"]);
    assert!(items[0].is_low_stock());
}

#[sqlx::test(migrations = "../../migrations")]
async fn stored_orders_build_the_expected_report(pool: sqlx::PgPool) {
    let product = insert_product(&pool, "A", 1, 5, true).await;
    let noon = Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap();
    insert_order(&pool, product, 3, Decimal::from(30), "fulfilled", noon).await;
    insert_order(&pool, product, 2, Decimal::from(20), "fulfilled", noon).await;

    let orders = list_orders_in_window(&pool, window().start, window().end)
        .await
        .unwrap();
    let inventory = list_inventory(&pool).await.unwrap();
    let report = build_daily_report(&window(), &orders, &inventory, Utc::now()).unwrap();

    assert_eq!(report.total_revenue, Decimal::from(50));
    assert_eq!(report.total_orders, 2);
    assert_eq!(report.per_product["A"].units_sold, 5);
    assert!(report.is_low_stock("A"));
}

// ---------------------------------------------------------------------------
// Daily reports
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn upsert_daily_report_twice_keeps_one_row(pool: sqlx::PgPool) {
    let report = sample_report(2);

    let first = upsert_daily_report(&pool, &report).await.expect("first upsert");
    let second = upsert_daily_report(&pool, &report).await.expect("second upsert");

    assert_eq!(first.id, second.id);
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM daily_reports")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);

    let stored = get_daily_report(&pool, report_date())
        .await
        .unwrap()
        .expect("report exists")
        .into_report()
        .unwrap();
    assert_eq!(stored.total_orders, report.total_orders);
    assert_eq!(stored.total_revenue, report.total_revenue);
}

#[sqlx::test(migrations = "../../migrations")]
async fn upsert_daily_report_rerun_replaces_aggregates(pool: sqlx::PgPool) {
    upsert_daily_report(&pool, &sample_report(2)).await.unwrap();
    let replaced = upsert_daily_report(&pool, &sample_report(7)).await.unwrap();

    assert_eq!(replaced.total_orders, 7);
    assert!(replaced.updated_at >= replaced.created_at);
    let rows = list_daily_reports(&pool, 10).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].total_orders, 7);
}

#[sqlx::test(migrations = "../../migrations")]
async fn get_daily_report_for_missing_date_is_none(pool: sqlx::PgPool) {
    let row = get_daily_report(&pool, report_date()).await.unwrap();
    assert!(row.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_daily_reports_orders_newest_first(pool: sqlx::PgPool) {
    for day in 1..=3 {
        let mut report = sample_report(1);
        report.report_date = NaiveDate::from_ymd_opt(2026, 5, day).unwrap();
        upsert_daily_report(&pool, &report).await.unwrap();
    }

    let rows = list_daily_reports(&pool, 2).await.unwrap();
    let days: Vec<NaiveDate> = rows.iter().map(|r| r.report_date).collect();
    assert_eq!(
        days,
        vec![
            NaiveDate::from_ymd_opt(2026, 5, 3).unwrap(),
            NaiveDate::from_ymd_opt(2026, 5, 2).unwrap(),
        ]
    );
}

// ---------------------------------------------------------------------------
// Report runs
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn report_run_lifecycle_succeeds(pool: sqlx::PgPool) {
    let run = start_report_run(&pool, report_date(), "schedule")
        .await
        .expect("start run");
    assert_eq!(run.status, "running");

    complete_report_run(&pool, run.id).await.expect("complete run");

    let stored = get_report_run(&pool, run.id).await.unwrap();
    assert_eq!(stored.status, "succeeded");
    assert!(stored.completed_at.is_some());
}

#[sqlx::test(migrations = "../../migrations")]
async fn report_run_failure_records_stage(pool: sqlx::PgPool) {
    let run = start_report_run(&pool, report_date(), "manual").await.unwrap();

    fail_report_run(&pool, run.id, "committing", "disk full")
        .await
        .unwrap();

    let stored = get_report_run(&pool, run.id).await.unwrap();
    assert_eq!(stored.status, "failed");
    assert_eq!(stored.failed_stage.as_deref(), Some("committing"));
    assert_eq!(stored.error_message.as_deref(), Some("disk full"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn completing_a_finished_run_is_rejected(pool: sqlx::PgPool) {
    let run = start_report_run(&pool, report_date(), "cli").await.unwrap();
    complete_report_run(&pool, run.id).await.unwrap();

    let err = complete_report_run(&pool, run.id).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidRunTransition { .. }));
}

#[sqlx::test(migrations = "../../migrations")]
async fn skipped_runs_are_listed(pool: sqlx::PgPool) {
    start_report_run(&pool, report_date(), "schedule").await.unwrap();
    let skipped = record_skipped_run(&pool, report_date(), "manual").await.unwrap();
    assert_eq!(skipped.status, "skipped");
    assert!(skipped.completed_at.is_some());

    let runs = list_report_runs(&pool, 10).await.unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].id, skipped.id);
}

#[sqlx::test(migrations = "../../migrations")]
async fn abandoned_running_rows_are_closed_as_failed(pool: sqlx::PgPool) {
    let orphan = start_report_run(&pool, report_date(), "schedule").await.unwrap();
    let finished = start_report_run(&pool, report_date(), "manual").await.unwrap();
    complete_report_run(&pool, finished.id).await.unwrap();

    let closed = fail_abandoned_runs(&pool).await.expect("sweep");
    assert_eq!(closed, 1);

    let stored = get_report_run(&pool, orphan.id).await.unwrap();
    assert_eq!(stored.status, "failed");
    assert_eq!(stored.error_message.as_deref(), Some("abandoned"));
    assert!(stored.completed_at.is_some());
    assert_eq!(get_report_run(&pool, finished.id).await.unwrap().status, "succeeded");

    assert_eq!(fail_abandoned_runs(&pool).await.unwrap(), 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn get_report_run_missing_is_not_found(pool: sqlx::PgPool) {
    let err = get_report_run(&pool, 9_999).await.unwrap_err();
    assert!(matches!(err, DbError::NotFound));
}
