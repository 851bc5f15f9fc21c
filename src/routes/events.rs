use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::auth::Identity;
use crate::db::DbEvent;
use crate::error::ApiError;
use crate::services::events::{
    self, CreateEventRequest, CreatedEvent, EventResponses, EventView,
};
use crate::state::AppState;
use crate::util::now_ts;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseBody {
    #[serde(default)]
    pub response: String,
}

pub async fn list_events(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<Vec<EventView>>, ApiError> {
    let Query(query) = query?;
    let events = state
        .with_db(move |db| {
            events::list_events(
                db,
                &identity.employee_id,
                query.search.as_deref(),
                &now_ts(),
            )
        })
        .await?;
    Ok(Json(events))
}

pub async fn create_event(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    payload: Result<Json<CreateEventRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedEvent>), ApiError> {
    let Json(req) = payload?;
    let created = state
        .with_db(move |db| events::create_event(db, &identity.employee_id, &req))
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn respond(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(event_id): Path<String>,
    payload: Result<Json<ResponseBody>, JsonRejection>,
) -> Result<Json<EventView>, ApiError> {
    let Json(body) = payload?;
    let view = state
        .with_db(move |db| {
            events::respond_to_event(db, &event_id, &identity.employee_id, &body.response)
        })
        .await?;
    Ok(Json(view))
}

pub async fn responses(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(event_id): Path<String>,
) -> Result<Json<EventResponses>, ApiError> {
    let responses = state
        .with_db(move |db| events::event_responses(db, &event_id, &identity.employee_id))
        .await?;
    Ok(Json(responses))
}

pub async fn archive(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(event_id): Path<String>,
) -> Result<Json<DbEvent>, ApiError> {
    let event = state
        .with_db(move |db| events::archive_event(db, &event_id, &identity.employee_id))
        .await?;
    Ok(Json(event))
}
