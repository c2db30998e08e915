//! Read-only queries over the storefront's `orders` and `order_items` tables.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use invreport_core::{OrderLine, OrderRecord, OrderStatus};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `orders` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRow {
    pub id: i64,
    pub public_id: Uuid,
    pub status: String,
    pub total: Decimal,
    pub placed_at: DateTime<Utc>,
}

/// An `order_items` row joined to its product's SKU.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderItemRow {
    pub order_id: i64,
    pub sku: String,
    pub quantity: i32,
    pub amount: Decimal,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Load every order placed in `[start, end)` together with its line items.
///
/// Both reads run inside one read-only `REPEATABLE READ` transaction so the
/// items always match the orders, and neither read takes locks that would
/// block storefront writes. Products are identified by SKU.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a query fails, or [`DbError::MalformedRow`]
/// if an order carries a status outside `placed | fulfilled | cancelled`.
pub async fn list_orders_in_window(
    pool: &PgPool,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<OrderRecord>, DbError> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
        .execute(&mut *tx)
        .await?;

    let orders = sqlx::query_as::<_, OrderRow>(
        "SELECT id, public_id, status, total, placed_at \
         FROM orders \
         WHERE placed_at >= $1 AND placed_at < $2 \
         ORDER BY placed_at, id",
    )
    .bind(start)
    .bind(end)
    .fetch_all(&mut *tx)
    .await?;

    let order_ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
    let items = if order_ids.is_empty() {
        Vec::new()
    } else {
        sqlx::query_as::<_, OrderItemRow>(
            "SELECT oi.order_id, p.sku, oi.quantity, oi.amount \
             FROM order_items oi \
             JOIN products p ON p.id = oi.product_id \
             WHERE oi.order_id = ANY($1) \
             ORDER BY oi.order_id, oi.id",
        )
        .bind(order_ids.as_slice())
        .fetch_all(&mut *tx)
        .await?
    };

    tx.commit().await?;

    assemble_orders(orders, items)
}

/// Attach item rows to their orders, preserving the order of both inputs.
fn assemble_orders(
    orders: Vec<OrderRow>,
    items: Vec<OrderItemRow>,
) -> Result<Vec<OrderRecord>, DbError> {
    let mut lines_by_order: HashMap<i64, Vec<OrderLine>> = HashMap::new();
    for item in items {
        lines_by_order
            .entry(item.order_id)
            .or_default()
            .push(OrderLine {
                product_id: item.sku,
                quantity: i64::from(item.quantity),
                amount: item.amount,
            });
    }

    orders
        .into_iter()
        .map(|row| {
            let status = OrderStatus::parse(&row.status).ok_or_else(|| {
                DbError::MalformedRow(format!(
                    "order {} has unknown status '{}'",
                    row.public_id, row.status
                ))
            })?;
            Ok(OrderRecord {
                id: row.public_id.to_string(),
                lines: lines_by_order.remove(&row.id).unwrap_or_default(),
                total: row.total,
                placed_at: row.placed_at,
                status,
            })
        })
        .collect()
}
