//! Read-only inventory snapshot from the storefront's `products` table.

use invreport_core::InventoryItem;
use sqlx::PgPool;

use crate::DbError;

/// Stock columns of a `products` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InventoryRow {
    pub sku: String,
    pub name: String,
    pub stock: i32,
    pub reorder_threshold: i32,
}

impl From<InventoryRow> for InventoryItem {
    fn from(row: InventoryRow) -> Self {
        Self {
            product_id: row.sku,
            name: Some(row.name),
            stock: i64::from(row.stock),
            reorder_threshold: i64::from(row.reorder_threshold),
        }
    }
}

/// Returns the stock position of every active product, ordered by SKU.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_inventory(pool: &PgPool) -> Result<Vec<InventoryItem>, DbError> {
    let rows = sqlx::query_as::<_, InventoryRow>(
        "SELECT sku, name, stock, reorder_threshold \
         FROM products \
         WHERE is_active = true \
         ORDER BY sku",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(InventoryItem::from).collect())
}
