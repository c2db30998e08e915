//! Domain types and pure logic for the daily inventory report.
//!
//! Everything here is free of I/O except [`load_app_config`], which reads the
//! process environment. The report builder in particular must stay pure so
//! that re-running it over the same inputs yields the same report.

pub mod app_config;
pub mod config;
pub mod inventory;
pub mod orders;
pub mod report;
pub mod window;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env, parse_utc_offset};
pub use inventory::InventoryItem;
pub use orders::{OrderLine, OrderRecord, OrderStatus};
pub use report::{build_daily_report, DailyReport, LowStockItem, ProductSales, ReportBuildError};
pub use window::{previous_day, ReportWindow};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
