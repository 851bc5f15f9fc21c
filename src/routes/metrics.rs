use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::Identity;
use crate::db::{DbMetricsSnapshot, DbReport};
use crate::error::ApiError;
use crate::services::metrics::{self, MetricsData, SnapshotRun};
use crate::services::reports;
use crate::state::AppState;
use crate::types::ReportFormat;

#[derive(Debug, Default, Deserialize)]
pub struct WindowQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyMetrics {
    pub start: String,
    pub end: String,
    #[serde(flatten)]
    pub metrics: MetricsData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReportBody {
    pub format: Option<String>,
}

pub async fn my_metrics(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    query: Result<Query<WindowQuery>, QueryRejection>,
) -> Result<Json<MyMetrics>, ApiError> {
    let Query(query) = query?;
    let (start, end) =
        metrics::resolve_window(query.start.as_deref(), query.end.as_deref(), Utc::now())?;
    let result = state
        .with_db(move |db| {
            let data = metrics::calculate_metrics_data(db, &identity.employee_id, &start, &end)?;
            Ok(MyMetrics {
                start,
                end,
                metrics: data,
            })
        })
        .await?;
    Ok(Json(result))
}

pub async fn team(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<Vec<DbMetricsSnapshot>>, ApiError> {
    identity.require_leader()?;
    let snapshots = state
        .with_db(move |db| Ok(metrics::team_metrics(db, &identity.employee_id)?))
        .await?;
    Ok(Json(snapshots))
}

pub async fn snapshot_team(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<SnapshotRun>, ApiError> {
    identity.require_leader()?;
    let run = state
        .with_db(move |db| {
            Ok(metrics::snapshot_direct_reports(
                db,
                &identity.employee_id,
                Utc::now(),
            )?)
        })
        .await?;
    Ok(Json(run))
}

pub async fn generate_report(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    payload: Result<Json<ReportBody>, JsonRejection>,
) -> Result<(StatusCode, Json<DbReport>), ApiError> {
    identity.require_leader()?;
    let body = match payload {
        Ok(Json(body)) => body,
        Err(JsonRejection::MissingJsonContentType(_)) => ReportBody::default(),
        Err(e) => return Err(e.into()),
    };
    let format = match body.format.as_deref().filter(|f| !f.trim().is_empty()) {
        Some(raw) => raw.trim().parse::<ReportFormat>().map_err(ApiError::Validation)?,
        None => state.config.default_report_format,
    };

    let sink = reports::sink_for(format, &state.config);
    let report = state
        .with_db(move |db| {
            Ok(reports::compile_report(
                db,
                &identity.employee_id,
                sink.as_ref(),
                Utc::now(),
            )?)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<Vec<DbReport>>, ApiError> {
    identity.require_leader()?;
    let reports = state
        .with_db(move |db| Ok(db.get_reports_for_leader(&identity.employee_id)?))
        .await?;
    Ok(Json(reports))
}

pub async fn download_report(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(report_id): Path<String>,
) -> Result<Response, ApiError> {
    let download = state
        .with_db(move |db| reports::load_report(db, &report_id, &identity.employee_id))
        .await?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        download.filename.replace('"', "")
    );
    Ok((
        [
            (CONTENT_TYPE, download.content_type),
            (CONTENT_DISPOSITION, disposition),
        ],
        download.data,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::db::test_utils::*;
    use crate::routes::build_router;
    use crate::routes::test_support::*;
    use crate::state::test_state::test_app_state;
    use crate::util::now_ts;

    #[tokio::test]
    async fn test_team_metrics_requires_leader() {
        let state = test_app_state();
        let emp = {
            let db = state.db.lock();
            seed_employee(&db, "Ana", None, None, None)
        };
        let app = build_router(state);
        let (status, _) = send(&app, "GET", "/metrics/team", Some(&token(&emp, false, false)), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_no_tasks_is_not_found() {
        let state = test_app_state();
        let emp = {
            let db = state.db.lock();
            seed_employee(&db, "Ana", None, None, None)
        };
        let app = build_router(state);
        let (status, body) = send(&app, "GET", "/metrics/me", Some(&token(&emp, false, false)), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["message"].as_str().unwrap_or_default().contains("No tasks"));

        let (status, _) = send(
            &app,
            "GET",
            "/metrics/me?start=yesterday",
            Some(&token(&emp, false, false)),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_snapshot_report_and_download() {
        let state = test_app_state();
        let (boss, emp, stranger) = {
            let db = state.db.lock();
            let boss = seed_employee(&db, "Boss", None, None, None);
            let emp = seed_employee(&db, "Ana", None, None, Some(&boss));
            let stranger = seed_employee(&db, "Other", None, None, None);
            db.insert_task("t", None, &emp, &boss, None, &now_ts())
                .expect("task");
            (boss, emp, stranger)
        };
        let app = build_router(state);
        let boss_token = token(&boss, true, false);

        // Nothing to report before the first snapshot.
        let (status, _) = send(
            &app,
            "POST",
            "/metrics/reports",
            Some(&boss_token),
            Some(json!({"format": "csv"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, run) = send(&app, "POST", "/metrics/snapshots", Some(&boss_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(run["snapshots"][0]["employeeId"], json!(emp));

        let (status, _) = send(
            &app,
            "POST",
            "/metrics/reports",
            Some(&boss_token),
            Some(json!({"format": "docx"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, report) = send(&app, "POST", "/metrics/reports", Some(&boss_token), None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(report["format"], json!("pdf"));
        let uri = format!(
            "/metrics/reports/{}/download",
            report["id"].as_str().expect("report id")
        );

        let (status, _) = send(&app, "GET", &uri, Some(&token(&stranger, true, false)), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(&uri)
                    .header("authorization", format!("Bearer {}", boss_token))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"].to_str().expect("header"),
            "application/pdf"
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        assert!(bytes.starts_with(b"%PDF-1.4"));
    }
}
