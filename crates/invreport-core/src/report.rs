//! The daily report and the pure function that builds it.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::inventory::InventoryItem;
use crate::orders::OrderRecord;
use crate::window::ReportWindow;

/// Units and revenue for one product on the report date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSales {
    pub units_sold: i64,
    pub revenue: Decimal,
}

/// A product whose stock is below its reorder threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockItem {
    pub product_id: String,
    pub name: Option<String>,
    pub stock: i64,
    pub reorder_threshold: i64,
}

/// Aggregate of one calendar day's orders plus the inventory snapshot taken
/// when the report was built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyReport {
    pub report_date: NaiveDate,
    pub total_revenue: Decimal,
    /// Non-cancelled orders placed within the report window.
    pub total_orders: i64,
    pub cancelled_orders: i64,
    pub units_sold: i64,
    /// Keyed by product id; ordered so two builds over the same input
    /// serialize identically.
    pub per_product: BTreeMap<String, ProductSales>,
    /// Sorted by product id.
    pub low_stock: Vec<LowStockItem>,
    pub generated_at: DateTime<Utc>,
}

impl DailyReport {
    /// A report with zero totals and nothing flagged.
    #[must_use]
    pub fn empty(report_date: NaiveDate, generated_at: DateTime<Utc>) -> Self {
        Self {
            report_date,
            total_revenue: Decimal::ZERO,
            total_orders: 0,
            cancelled_orders: 0,
            units_sold: 0,
            per_product: BTreeMap::new(),
            low_stock: Vec::new(),
            generated_at,
        }
    }

    #[must_use]
    pub fn is_low_stock(&self, product_id: &str) -> bool {
        self.low_stock.iter().any(|i| i.product_id == product_id)
    }
}

/// Input that the builder refuses to aggregate.
///
/// None of these can arise from well-formed storefront data; seeing one means
/// the source layer handed over something inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportBuildError {
    #[error("order {0} appears more than once in the input")]
    DuplicateOrder(String),

    #[error("order {order_id} has negative quantity {quantity} for product {product_id}")]
    NegativeQuantity {
        order_id: String,
        product_id: String,
        quantity: i64,
    },

    #[error("unit count overflowed while summing product {0}")]
    UnitOverflow(String),

    #[error("revenue overflowed while summing order {order_id}")]
    RevenueOverflow { order_id: String },

    #[error("inventory lists product {0} more than once")]
    DuplicateInventoryItem(String),
}

/// Build the report for `window` from raw orders and the inventory snapshot.
///
/// Orders placed outside the window are ignored. Cancelled orders are counted
/// in `cancelled_orders` and contribute nothing else. Every inventory item
/// with stock below its threshold is flagged whether or not it sold.
///
/// # Errors
///
/// Returns [`ReportBuildError`] when the input violates one of the builder's
/// preconditions; no partial report is produced.
pub fn build_daily_report(
    window: &ReportWindow,
    orders: &[OrderRecord],
    inventory: &[InventoryItem],
    generated_at: DateTime<Utc>,
) -> Result<DailyReport, ReportBuildError> {
    let mut report = DailyReport::empty(window.date, generated_at);
    let mut seen_orders: HashSet<&str> = HashSet::with_capacity(orders.len());

    for order in orders {
        if !seen_orders.insert(order.id.as_str()) {
            return Err(ReportBuildError::DuplicateOrder(order.id.clone()));
        }
        if !window.contains(order.placed_at) {
            continue;
        }
        if !order.counts_toward_sales() {
            report.cancelled_orders += 1;
            continue;
        }

        report.total_orders += 1;
        let revenue_overflow = || ReportBuildError::RevenueOverflow {
            order_id: order.id.clone(),
        };
        report.total_revenue = report
            .total_revenue
            .checked_add(order.total)
            .ok_or_else(revenue_overflow)?;

        for line in &order.lines {
            if line.quantity < 0 {
                return Err(ReportBuildError::NegativeQuantity {
                    order_id: order.id.clone(),
                    product_id: line.product_id.clone(),
                    quantity: line.quantity,
                });
            }

            let entry = report
                .per_product
                .entry(line.product_id.clone())
                .or_default();
            entry.units_sold = entry
                .units_sold
                .checked_add(line.quantity)
                .ok_or_else(|| ReportBuildError::UnitOverflow(line.product_id.clone()))?;
            entry.revenue = entry
                .revenue
                .checked_add(line.amount)
                .ok_or_else(revenue_overflow)?;

            report.units_sold = report
                .units_sold
                .checked_add(line.quantity)
                .ok_or_else(|| ReportBuildError::UnitOverflow(line.product_id.clone()))?;
        }
    }

    let mut seen_products: HashSet<&str> = HashSet::with_capacity(inventory.len());
    for item in inventory {
        if !seen_products.insert(item.product_id.as_str()) {
            return Err(ReportBuildError::DuplicateInventoryItem(
                item.product_id.clone(),
            ));
        }
        if item.is_low_stock() {
            report.low_stock.push(LowStockItem {
                product_id: item.product_id.clone(),
                name: item.name.clone(),
                stock: item.stock,
                reorder_threshold: item.reorder_threshold,
            });
        }
    }
    report
        .low_stock
        .sort_by(|a, b| a.product_id.cmp(&b.product_id));

    Ok(report)
}

#[cfg(test)]
#[path = "report_test.rs"]
mod tests;
