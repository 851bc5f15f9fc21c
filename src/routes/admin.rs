use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use crate::auth::Identity;
use crate::error::ApiError;
use crate::jobs::JobReport;
use crate::state::AppState;
use crate::types::{ExecutionTrigger, JobId};

/// Run a background job now. Waits behind any run already in progress.
pub async fn run_job(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(job): Path<String>,
) -> Result<Json<JobReport>, ApiError> {
    identity.require_admin()?;
    let job_id: JobId = job.parse().map_err(ApiError::NotFound)?;
    log::info!("Manual run of {} requested by {}", job_id, identity.employee_id);
    let report = state
        .jobs
        .run(job_id, &state, ExecutionTrigger::Manual)
        .await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::db::test_utils::*;
    use crate::routes::build_router;
    use crate::routes::test_support::*;
    use crate::state::test_state::test_app_state;

    #[tokio::test]
    async fn test_run_job_requires_admin_and_known_job() {
        let state = test_app_state();
        let (admin, emp) = {
            let db = state.db.lock();
            (
                seed_employee(&db, "Admin", None, None, None),
                seed_employee(&db, "Ana", None, None, None),
            )
        };
        let app = build_router(state);

        let (status, _) = send(
            &app,
            "POST",
            "/admin/jobs/archive_events/run",
            Some(&token(&emp, true, false)),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let admin_token = token(&admin, false, true);
        let (status, _) = send(&app, "POST", "/admin/jobs/defragment/run", Some(&admin_token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, report) = send(
            &app,
            "POST",
            "/admin/jobs/archive_events/run",
            Some(&admin_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["job"], json!("archive_events"));
        assert_eq!(report["trigger"], json!("manual"));
        assert_eq!(report["affected"], json!(0));
    }
}
