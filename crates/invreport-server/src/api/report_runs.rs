use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct ReportRunsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct ReportRunItem {
    report_run_id: Uuid,
    report_date: NaiveDate,
    trigger_source: String,
    status: String,
    failed_stage: Option<String>,
    error_message: Option<String>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<invreport_db::ReportRunRow> for ReportRunItem {
    fn from(row: invreport_db::ReportRunRow) -> Self {
        Self {
            report_run_id: row.public_id,
            report_date: row.report_date,
            trigger_source: row.trigger_source,
            status: row.status,
            failed_stage: row.failed_stage,
            error_message: row.error_message,
            started_at: row.started_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
        }
    }
}

pub(super) async fn list_report_runs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ReportRunsQuery>,
) -> Result<Json<ApiResponse<Vec<ReportRunItem>>>, ApiError> {
    let rows = invreport_db::list_report_runs(&state.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(ReportRunItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}
