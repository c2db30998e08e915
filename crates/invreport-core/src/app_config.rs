use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::FixedOffset;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    /// Six-field cron expression (seconds first), evaluated in UTC.
    pub report_cron: String,
    /// Offset that defines where a report's calendar day begins and ends.
    pub report_utc_offset: FixedOffset,
    /// Upper bound on each fetch/commit call of a report run.
    pub report_stage_timeout_secs: u64,
    pub report_export_dir: Option<PathBuf>,
    pub scheduler_enabled: bool,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("report_cron", &self.report_cron)
            .field("report_utc_offset", &self.report_utc_offset)
            .field(
                "report_stage_timeout_secs",
                &self.report_stage_timeout_secs,
            )
            .field("report_export_dir", &self.report_export_dir)
            .field("scheduler_enabled", &self.scheduler_enabled)
            .finish()
    }
}
