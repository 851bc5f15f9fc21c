use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::auth::Identity;
use crate::db::DbTask;
use crate::error::ApiError;
use crate::services::tasks::{self, CreateTaskRequest, TaskUpdate};
use crate::state::AppState;
use crate::util::now_ts;

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    #[serde(default)]
    pub status: String,
}

pub async fn my_tasks(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> Result<Json<Vec<DbTask>>, ApiError> {
    let Query(query) = query?;
    let tasks = state
        .with_db(move |db| {
            tasks::list_my_tasks(db, &identity.employee_id, query.status.as_deref())
        })
        .await?;
    Ok(Json(tasks))
}

pub async fn assigned_tasks(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<Vec<DbTask>>, ApiError> {
    let tasks = state
        .with_db(move |db| Ok(db.get_tasks_assigned_by(&identity.employee_id)?))
        .await?;
    Ok(Json(tasks))
}

pub async fn create_task(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DbTask>), ApiError> {
    let Json(req) = payload?;
    let task = state
        .with_db(move |db| tasks::create_task(db, &identity.employee_id, &req, &now_ts()))
        .await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(task_id): Path<String>,
    payload: Result<Json<StatusBody>, JsonRejection>,
) -> Result<Json<TaskUpdate>, ApiError> {
    let Json(body) = payload?;
    let update = state
        .with_db(move |db| {
            tasks::update_task_status(db, &task_id, &identity.employee_id, &body.status, &now_ts())
        })
        .await?;
    Ok(Json(update))
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
    async fn test_task_lifecycle_over_http() {
        let state = test_app_state();
        let (boss, emp) = {
            let db = state.db.lock();
            let boss = seed_employee(&db, "Boss", None, None, None);
            let emp = seed_employee(&db, "Ana", None, None, Some(&boss));
            (boss, emp)
        };
        let app = build_router(state);
        let boss_token = token(&boss, true, false);
        let emp_token = token(&emp, false, false);

        let (status, _) = send(
            &app,
            "POST",
            "/tasks",
            Some(&boss_token),
            Some(json!({"title": "Ship it", "assignedTo": "nobody"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, task) = send(
            &app,
            "POST",
            "/tasks",
            Some(&boss_token),
            Some(json!({"title": "Ship it", "assignedTo": emp})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let uri = format!("/tasks/{}/status", task["id"].as_str().expect("task id"));

        let (status, _) = send(&app, "PATCH", &uri, Some(&emp_token), Some(json!({"status": "Done"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(
            &app,
            "PATCH",
            &uri,
            Some(&boss_token),
            Some(json!({"status": "Completed"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, update) = send(
            &app,
            "PATCH",
            &uri,
            Some(&emp_token),
            Some(json!({"status": "Completed"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(update["achievement"].is_object());

        let (_, done) = send(&app, "GET", "/tasks?status=Completed", Some(&emp_token), None).await;
        assert_eq!(done.as_array().map(Vec::len), Some(1));
        let (_, assigned) = send(&app, "GET", "/tasks/assigned", Some(&boss_token), None).await;
        assert_eq!(assigned.as_array().map(Vec::len), Some(1));
    }
}
