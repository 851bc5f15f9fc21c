use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::auth::Identity;
use crate::db::{DbDatamind, DbDatamindType};
use crate::error::ApiError;
use crate::services::datamind::{self, CreateDatamindRequest};
use crate::services::imports::{self, ImportSummary};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TypeQuery {
    #[serde(rename = "type")]
    pub type_name: Option<String>,
}

pub async fn list_datamind(
    State(state): State<Arc<AppState>>,
    _identity: Identity,
    query: Result<Query<TypeQuery>, QueryRejection>,
) -> Result<Json<Vec<DbDatamind>>, ApiError> {
    let Query(query) = query?;
    let cards = state
        .with_db(move |db| datamind::list_datamind(db, query.type_name.as_deref()))
        .await?;
    Ok(Json(cards))
}

pub async fn list_types(
    State(state): State<Arc<AppState>>,
    _identity: Identity,
) -> Result<Json<Vec<DbDatamindType>>, ApiError> {
    let types = state.with_db(|db| Ok(db.get_datamind_types()?)).await?;
    Ok(Json(types))
}

pub async fn create_datamind(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    payload: Result<Json<CreateDatamindRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DbDatamind>), ApiError> {
    identity.require_admin()?;
    let Json(req) = payload?;
    let card = state
        .with_db(move |db| datamind::create_datamind(db, &req))
        .await?;
    Ok((StatusCode::CREATED, Json(card)))
}

pub async fn import_datamind(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    body: Bytes,
) -> Result<Json<ImportSummary>, ApiError> {
    identity.require_admin()?;
    let upload_dir = state.config.upload_dir.clone();
    let summary = state
        .with_db(move |db| {
            let path = imports::save_upload(&upload_dir, "datamind", &body)?;
            Ok(imports::import_datamind_workbook(db, &path)?)
        })
        .await?;
    Ok(Json(summary))
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
    async fn test_admin_creates_and_anyone_filters() {
        let state = test_app_state();
        let (admin, emp) = {
            let db = state.db.lock();
            (
                seed_employee(&db, "Admin", None, None, None),
                seed_employee(&db, "Ana", None, None, None),
            )
        };
        let app = build_router(state);
        let card = json!({"type": "Onboarding", "title": "Laptop", "content": "Ask IT"});

        let (status, _) = send(
            &app,
            "POST",
            "/datamind",
            Some(&token(&emp, false, false)),
            Some(card.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let admin_token = token(&admin, false, true);
        let (status, created) = send(&app, "POST", "/datamind", Some(&admin_token), Some(card)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["typeName"], json!("Onboarding"));
        let (status, _) = send(
            &app,
            "POST",
            "/datamind",
            Some(&admin_token),
            Some(json!({"type": "Onboarding", "title": "", "content": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let emp_token = token(&emp, false, false);
        let (_, listed) = send(&app, "GET", "/datamind?type=Onboarding", Some(&emp_token), None).await;
        assert_eq!(listed.as_array().map(Vec::len), Some(1));
        let (_, other) = send(&app, "GET", "/datamind?type=Benefits", Some(&emp_token), None).await;
        assert_eq!(other, json!([]));
        let (_, types) = send(&app, "GET", "/datamind/types", Some(&emp_token), None).await;
        assert_eq!(types[0]["name"], json!("Onboarding"));
    }
}
