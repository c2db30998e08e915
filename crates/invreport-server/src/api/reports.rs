use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use invreport_core::DailyReport;
use invreport_db::DailyReportRow;
use invreport_job::{RunOutcome, TriggerSource};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct ReportsQuery {
    pub limit: Option<i64>,
}

/// Body of `POST /api/v1/reports/run`. An empty body reports on yesterday.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct RunReportRequest {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub(super) struct StoredReportItem {
    #[serde(flatten)]
    report: DailyReport,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StoredReportItem {
    fn from_row(row: DailyReportRow) -> Result<Self, invreport_db::DbError> {
        let created_at = row.created_at;
        let updated_at = row.updated_at;
        Ok(Self {
            report: row.into_report()?,
            created_at,
            updated_at,
        })
    }
}

pub(super) async fn run_report(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Bytes,
) -> Result<Json<ApiResponse<DailyReport>>, ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        RunReportRequest::default()
    } else {
        serde_json::from_slice::<RunReportRequest>(&body).map_err(|e| {
            ApiError::new(
                req_id.0.clone(),
                "bad_request",
                format!("invalid request body: {e}"),
            )
        })?
    };

    // Own task, so a client disconnect cannot cancel the run mid-stage.
    let job = Arc::clone(&state.job);
    let run = tokio::spawn(async move { job.trigger(request.date, TriggerSource::Manual).await });
    let outcome = run.await.map_err(|e| {
        tracing::error!(error = %e, "report run task failed");
        ApiError::new(req_id.0.clone(), "internal_error", "report run task failed")
    })?;

    match outcome {
        RunOutcome::Completed(report) => Ok(Json(ApiResponse {
            data: report,
            meta: ResponseMeta::new(req_id.0),
        })),
        RunOutcome::Skipped { report_date } => Err(ApiError::new(
            req_id.0,
            "run_in_progress",
            format!("a report run is already in progress; trigger for {report_date} was skipped"),
        )),
        RunOutcome::Failed { error, .. } => Err(ApiError::new(
            req_id.0,
            error.code(),
            error.to_string(),
        )),
    }
}

pub(super) async fn list_reports(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ReportsQuery>,
) -> Result<Json<ApiResponse<Vec<StoredReportItem>>>, ApiError> {
    let rows = invreport_db::list_daily_reports(&state.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(StoredReportItem::from_row)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_report(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(date): Path<String>,
) -> Result<Json<ApiResponse<StoredReportItem>>, ApiError> {
    let report_date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|_| {
        ApiError::new(
            req_id.0.clone(),
            "bad_request",
            format!("'{date}' is not a YYYY-MM-DD date"),
        )
    })?;

    let row = invreport_db::get_daily_report(&state.pool, report_date)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                req_id.0.clone(),
                "not_found",
                format!("no report for {report_date}"),
            )
        })?;

    let item = StoredReportItem::from_row(row).map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: item,
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use invreport_core::DailyReport;

    use super::StoredReportItem;

    #[test]
    fn stored_report_item_flattens_the_report() {
        let item = StoredReportItem {
            report: DailyReport::empty(NaiveDate::from_ymd_opt(2026, 5, 4).unwrap(), Utc::now()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(&item).expect("serialize stored report");
        assert_eq!(json["report_date"], "2026-05-04");
        assert_eq!(json["total_revenue"], "0");
        assert!(json.get("report").is_none());
        assert!(json["updated_at"].is_string());
    }

    #[test]
    fn run_request_rejects_unknown_fields() {
        assert!(serde_json::from_str::<super::RunReportRequest>(r#"{"day":"2026-05-04"}"#).is_err());
        let parsed: super::RunReportRequest =
            serde_json::from_str(r#"{"date":"2026-05-04"}"#).unwrap();
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2026, 5, 4));
    }
}
