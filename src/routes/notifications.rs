use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::Identity;
use crate::db::{DbNotification, DbNotificationSetting, DbNotificationType};
use crate::error::ApiError;
use crate::services::notifications::{self, NotificationOutcome};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
}

/// Fields are optional so a missing one is reported as a 400 by the
/// service rather than as a body rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateNotificationBody {
    pub recipient_id: Option<String>,
    pub noti_type_id: Option<String>,
    pub related_entity_id: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingBody {
    #[serde(default)]
    pub noti_type_id: String,
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct MarkedRead {
    pub updated: usize,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> Result<Json<Vec<DbNotification>>, ApiError> {
    let Query(query) = query?;
    let items = state
        .with_db(move |db| {
            notifications::list_notifications(db, &identity.employee_id, query.status.as_deref())
        })
        .await?;
    Ok(Json(items))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    payload: Result<Json<CreateNotificationBody>, JsonRejection>,
) -> Result<(StatusCode, Json<NotificationOutcome>), ApiError> {
    identity.require_admin_or_leader()?;
    let Json(body) = payload?;
    let outcome = state
        .with_db(move |db| {
            Ok(notifications::create_notification(
                db,
                body.recipient_id.as_deref(),
                body.noti_type_id.as_deref(),
                body.related_entity_id.as_deref(),
                body.message.as_deref(),
            )?)
        })
        .await?;
    let status = match outcome {
        NotificationOutcome::Success { .. } => StatusCode::CREATED,
        NotificationOutcome::Skipped => StatusCode::OK,
    };
    Ok((status, Json(outcome)))
}

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(notification_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .with_db(move |db| notifications::mark_read(db, &notification_id, &identity.employee_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<MarkedRead>, ApiError> {
    let updated = state
        .with_db(move |db| Ok(db.mark_all_notifications_read(&identity.employee_id)?))
        .await?;
    Ok(Json(MarkedRead { updated }))
}

pub async fn types(
    State(state): State<Arc<AppState>>,
    _identity: Identity,
) -> Result<Json<Vec<DbNotificationType>>, ApiError> {
    let types = state
        .with_db(|db| Ok(db.get_all_notification_types()?))
        .await?;
    Ok(Json(types))
}

pub async fn settings(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<Vec<DbNotificationSetting>>, ApiError> {
    let settings = state
        .with_db(move |db| Ok(db.get_notification_settings(&identity.employee_id)?))
        .await?;
    Ok(Json(settings))
}

pub async fn update_setting(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    payload: Result<Json<SettingBody>, JsonRejection>,
) -> Result<Json<Vec<DbNotificationSetting>>, ApiError> {
    let Json(body) = payload?;
    let settings = state
        .with_db(move |db| {
            notifications::update_setting(
                db,
                &identity.employee_id,
                body.noti_type_id.trim(),
                body.enabled,
            )
        })
        .await?;
    Ok(Json(settings))
}
