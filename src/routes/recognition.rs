use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::auth::Identity;
use crate::db::{DbAchievement, DbBadge, DbMilestone};
use crate::error::ApiError;
use crate::routes::posts::VisibilityBody;
use crate::services::imports::{self, ImportSummary};
use crate::services::recognition::{
    self, AwardBadgeRequest, CreateBadgeRequest, MilestoneCheck,
};
use crate::state::AppState;

pub async fn list_badges(
    State(state): State<Arc<AppState>>,
    _identity: Identity,
) -> Result<Json<Vec<DbBadge>>, ApiError> {
    let badges = state.with_db(|db| Ok(db.get_all_badges()?)).await?;
    Ok(Json(badges))
}

pub async fn create_badge(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    payload: Result<Json<CreateBadgeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DbBadge>), ApiError> {
    identity.require_admin()?;
    let Json(req) = payload?;
    let badge = state
        .with_db(move |db| recognition::create_badge(db, &req))
        .await?;
    Ok((StatusCode::CREATED, Json(badge)))
}

pub async fn award_badge(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(badge_id): Path<String>,
    payload: Result<Json<AwardBadgeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DbAchievement>), ApiError> {
    identity.require_admin_or_leader()?;
    let Json(req) = payload?;
    let achievement = state
        .with_db(move |db| recognition::award_badge(db, &badge_id, &req))
        .await?;
    Ok((StatusCode::CREATED, Json(achievement)))
}

/// Spreadsheet upload; the raw body is the workbook.
pub async fn import_badges(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    body: Bytes,
) -> Result<Json<ImportSummary>, ApiError> {
    identity.require_admin()?;
    let upload_dir = state.config.upload_dir.clone();
    let summary = state
        .with_db(move |db| {
            let path = imports::save_upload(&upload_dir, "badges", &body)?;
            Ok(imports::import_badge_workbook(db, &path)?)
        })
        .await?;
    Ok(Json(summary))
}

pub async fn my_achievements(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<Vec<DbAchievement>>, ApiError> {
    let achievements = state
        .with_db(move |db| Ok(db.get_achievements_for(&identity.employee_id)?))
        .await?;
    Ok(Json(achievements))
}

pub async fn achievement_visibility(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(achievement_id): Path<String>,
    payload: Result<Json<VisibilityBody>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(body) = payload?;
    state
        .with_db(move |db| {
            recognition::set_achievement_visibility(
                db,
                &achievement_id,
                &identity.employee_id,
                body.visibility,
            )
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn my_milestones(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<Vec<DbMilestone>>, ApiError> {
    let milestones = state
        .with_db(move |db| Ok(db.get_milestones_for(&identity.employee_id)?))
        .await?;
    Ok(Json(milestones))
}

pub async fn milestone_visibility(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(milestone_id): Path<String>,
    payload: Result<Json<VisibilityBody>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(body) = payload?;
    state
        .with_db(move |db| {
            recognition::set_milestone_visibility(
                db,
                &milestone_id,
                &identity.employee_id,
                body.visibility,
            )
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn check_my_milestones(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<MilestoneCheck>, ApiError> {
    let check = state
        .with_db(move |db| {
            recognition::check_employee_milestones(db, &identity.employee_id, chrono::Utc::now())
        })
        .await?;
    Ok(Json(check))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use rusqlite::params;
    use serde_json::json;

    use crate::db::test_utils::*;
    use crate::routes::build_router;
    use crate::routes::test_support::*;
    use crate::state::test_state::test_app_state;

    #[tokio::test]
    async fn test_award_roles_and_duplicates() {
        let state = test_app_state();
        let (admin, leader, emp) = {
            let db = state.db.lock();
            (
                seed_employee(&db, "Admin", None, None, None),
                seed_employee(&db, "Lead", None, None, None),
                seed_employee(&db, "Ana", None, None, None),
            )
        };
        let app = build_router(state);

        let (status, badge) = send(
            &app,
            "POST",
            "/badges",
            Some(&token(&admin, false, true)),
            Some(json!({"name": "Mentor"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let uri = format!("/badges/{}/award", badge["id"].as_str().expect("badge id"));

        let (status, _) = send(
            &app,
            "POST",
            &uri,
            Some(&token(&emp, false, false)),
            Some(json!({"employeeId": emp})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let leader_token = token(&leader, true, false);
        let (status, achievement) = send(
            &app,
            "POST",
            &uri,
            Some(&leader_token),
            Some(json!({"employeeId": emp})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = send(
            &app,
            "POST",
            &uri,
            Some(&leader_token),
            Some(json!({"employeeId": emp})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Someone else's achievement is invisible to the caller.
        let visibility_uri = format!(
            "/achievements/{}/visibility",
            achievement["id"].as_str().expect("achievement id")
        );
        let (status, _) = send(
            &app,
            "PATCH",
            &visibility_uri,
            Some(&leader_token),
            Some(json!({"visibility": false})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(
            &app,
            "PATCH",
            &visibility_uri,
            Some(&token(&emp, false, false)),
            Some(json!({"visibility": false})),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_milestone_check_is_idempotent_over_http() {
        let state = test_app_state();
        let emp = {
            let db = state.db.lock();
            let emp = seed_employee(&db, "Veteran", None, None, None);
            db.conn_ref()
                .execute(
                    "UPDATE employees SET hire_date = '2000-01-01T00:00:00Z' WHERE id = ?1",
                    params![emp],
                )
                .expect("hire date");
            emp
        };
        let app = build_router(state);
        let emp_token = token(&emp, false, false);

        let (status, first) = send(&app, "POST", "/milestones/check", Some(&emp_token), None).await;
        assert_eq!(status, StatusCode::OK);
        let created = first["created"].as_array().map(Vec::len).unwrap_or(0);
        assert!(created >= 5);

        let (_, second) = send(&app, "POST", "/milestones/check", Some(&emp_token), None).await;
        assert_eq!(second["created"], json!([]));

        let (_, listed) = send(&app, "GET", "/milestones", Some(&emp_token), None).await;
        assert_eq!(listed.as_array().map(Vec::len), Some(created));
    }

    #[tokio::test]
    async fn test_import_rejects_non_workbook() {
        let state = test_app_state();
        let admin = {
            let db = state.db.lock();
            seed_employee(&db, "Admin", None, None, None)
        };
        let app = build_router(state);
        let (status, _) = send(
            &app,
            "POST",
            "/badges/import",
            Some(&token(&admin, false, true)),
            Some(json!("not a spreadsheet")),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
