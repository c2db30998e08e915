use serde::{Deserialize, Serialize};

/// Stock position for one product. Read-only to the report core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub product_id: String,
    pub name: Option<String>,
    pub stock: i64,
    pub reorder_threshold: i64,
}

impl InventoryItem {
    /// Stock strictly below the reorder threshold. At-threshold is not low.
    #[must_use]
    pub fn is_low_stock(&self) -> bool {
        self.stock < self.reorder_threshold
    }
}
