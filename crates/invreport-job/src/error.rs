use invreport_core::ReportBuildError;
use thiserror::Error;

use crate::pipeline::PipelineStage;

/// Why a report run failed.
///
/// Every variant belongs to exactly one pipeline stage; see [`ReportError::stage`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    /// The source could not be read, or the read timed out.
    #[error("{what} unavailable: {reason}")]
    DataUnavailable { what: &'static str, reason: String },

    /// The sink rejected the report or an export could not be written.
    #[error("report could not be persisted: {reason}")]
    PersistenceError { reason: String },

    /// The builder refused its input. Indicates a defect upstream.
    #[error("report build invariant violated: {0}")]
    BuildInvariantViolation(#[from] ReportBuildError),

    /// The run was dropped before it finished, e.g. its task was cancelled.
    #[error("run abandoned during {stage}")]
    Abandoned { stage: PipelineStage },
}

impl ReportError {
    pub fn data_unavailable(what: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::DataUnavailable {
            what,
            reason: reason.to_string(),
        }
    }

    pub fn persistence(reason: impl std::fmt::Display) -> Self {
        Self::PersistenceError {
            reason: reason.to_string(),
        }
    }

    /// The stage in which this error arises.
    #[must_use]
    pub fn stage(&self) -> PipelineStage {
        match self {
            ReportError::DataUnavailable { .. } => PipelineStage::Fetching,
            ReportError::BuildInvariantViolation(_) => PipelineStage::Building,
            ReportError::PersistenceError { .. } => PipelineStage::Committing,
            ReportError::Abandoned { stage } => *stage,
        }
    }

    /// Stable machine-readable code, used by the admin API and the run ledger.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            ReportError::DataUnavailable { .. } => "data_unavailable",
            ReportError::PersistenceError { .. } => "persistence_error",
            ReportError::BuildInvariantViolation(_) => "build_invariant_violation",
            ReportError::Abandoned { .. } => "abandoned",
        }
    }
}
