use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::auth::Identity;
use crate::db::DbPost;
use crate::error::ApiError;
use crate::services::posts::{self, CreatePostRequest};
use crate::state::AppState;

/// Body of every `PATCH .../visibility` endpoint.
#[derive(Debug, Deserialize)]
pub struct VisibilityBody {
    pub visibility: bool,
}

pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<Vec<DbPost>>, ApiError> {
    let posts = state
        .with_db(move |db| posts::list_visible_posts(db, &identity.employee_id))
        .await?;
    Ok(Json(posts))
}

pub async fn my_posts(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<Vec<DbPost>>, ApiError> {
    let posts = state
        .with_db(move |db| Ok(db.get_posts_by_author(&identity.employee_id)?))
        .await?;
    Ok(Json(posts))
}

pub async fn create_post(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    payload: Result<Json<CreatePostRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DbPost>), ApiError> {
    let Json(req) = payload?;
    let post = state
        .with_db(move |db| posts::create_post(db, &identity.employee_id, &req))
        .await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn set_visibility(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(post_id): Path<String>,
    payload: Result<Json<VisibilityBody>, JsonRejection>,
) -> Result<Json<DbPost>, ApiError> {
    let Json(body) = payload?;
    let post = state
        .with_db(move |db| {
            posts::set_post_visibility(db, &post_id, &identity.employee_id, body.visibility)
        })
        .await?;
    Ok(Json(post))
}

pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(post_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .with_db(move |db| posts::delete_post(db, &post_id, &identity.employee_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
