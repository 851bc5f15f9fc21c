use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::auth::Identity;
use crate::db::{DbDepartment, DbEmployee, DbTeam};
use crate::error::ApiError;
use crate::services::employees::{
    self, CreateEmployeeRequest, CreateTeamRequest, LoginRequest, LoginResponse, ProfileView,
    UpdateProfileRequest,
};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NameBody {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberBody {
    #[serde(default)]
    pub employee_id: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(req) = payload?;
    let secret = state.token_secret.clone();
    let ttl_hours = state.config.token_ttl_hours;
    let resp = state
        .with_db(move |db| employees::login(db, &secret, ttl_hours, &req, chrono::Utc::now()))
        .await?;
    Ok(Json(resp))
}

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<ProfileView>, ApiError> {
    let profile = state
        .with_db(move |db| employees::get_profile(db, &identity.employee_id))
        .await?;
    Ok(Json(profile))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<ProfileView>, ApiError> {
    let Json(req) = payload?;
    let profile = state
        .with_db(move |db| employees::update_profile(db, &identity.employee_id, &req))
        .await?;
    Ok(Json(profile))
}

pub async fn create_employee(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    payload: Result<Json<CreateEmployeeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DbEmployee>), ApiError> {
    identity.require_admin()?;
    let Json(req) = payload?;
    let employee = state
        .with_db(move |db| employees::create_employee(db, &req))
        .await?;
    Ok((StatusCode::CREATED, Json(employee)))
}

pub async fn list_departments(
    State(state): State<Arc<AppState>>,
    _identity: Identity,
) -> Result<Json<Vec<DbDepartment>>, ApiError> {
    let departments = state
        .with_db(|db| Ok(db.get_all_departments()?))
        .await?;
    Ok(Json(departments))
}

pub async fn create_department(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    payload: Result<Json<NameBody>, JsonRejection>,
) -> Result<(StatusCode, Json<DbDepartment>), ApiError> {
    identity.require_admin()?;
    let Json(body) = payload?;
    let department = state
        .with_db(move |db| employees::create_department(db, &body.name))
        .await?;
    Ok((StatusCode::CREATED, Json(department)))
}

pub async fn list_teams(
    State(state): State<Arc<AppState>>,
    _identity: Identity,
) -> Result<Json<Vec<DbTeam>>, ApiError> {
    let teams = state.with_db(|db| Ok(db.get_all_teams()?)).await?;
    Ok(Json(teams))
}

pub async fn create_team(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    payload: Result<Json<CreateTeamRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DbTeam>), ApiError> {
    identity.require_admin()?;
    let Json(req) = payload?;
    let team = state
        .with_db(move |db| employees::create_team(db, &req))
        .await?;
    Ok((StatusCode::CREATED, Json(team)))
}

pub async fn team_members(
    State(state): State<Arc<AppState>>,
    _identity: Identity,
    Path(team_id): Path<String>,
) -> Result<Json<Vec<DbEmployee>>, ApiError> {
    let members = state
        .with_db(move |db| employees::team_members(db, &team_id))
        .await?;
    Ok(Json(members))
}

pub async fn add_team_member(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(team_id): Path<String>,
    payload: Result<Json<MemberBody>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    identity.require_admin()?;
    let Json(body) = payload?;
    if body.employee_id.trim().is_empty() {
        return Err(ApiError::Validation("employeeId is required".into()));
    }
    let added = state
        .with_db(move |db| employees::add_team_member(db, &team_id, body.employee_id.trim()))
        .await?;
    Ok(if added {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    })
}

pub async fn remove_team_member(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path((team_id, employee_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    identity.require_admin()?;
    state
        .with_db(move |db| employees::remove_team_member(db, &team_id, &employee_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
