//! HTTP surface: one submodule per resource, all handlers thin wrappers
//! that authenticate, check roles and hand the store work to a service on
//! the blocking pool.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request};
use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod admin;
pub mod datamind;
pub mod employees;
pub mod events;
pub mod metrics;
pub mod notifications;
pub mod posts;
pub mod recognition;
pub mod tasks;

/// Spreadsheet uploads are larger than the default JSON limit.
const UPLOAD_BODY_LIMIT: usize = 10 * 1024 * 1024;

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let uploads = Router::new()
        .route("/badges/import", post(recognition::import_badges))
        .route("/datamind/import", post(datamind::import_datamind))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT));

    Router::new()
        // Identity and organisation
        .route("/login", post(employees::login))
        .route(
            "/profile",
            get(employees::get_profile).patch(employees::update_profile),
        )
        .route("/employees", post(employees::create_employee))
        .route(
            "/departments",
            get(employees::list_departments).post(employees::create_department),
        )
        .route("/teams", get(employees::list_teams).post(employees::create_team))
        .route(
            "/teams/{id}/members",
            get(employees::team_members).post(employees::add_team_member),
        )
        .route(
            "/teams/{id}/members/{employee_id}",
            delete(employees::remove_team_member),
        )
        // Posts
        .route("/posts", get(posts::list_posts).post(posts::create_post))
        .route("/posts/mine", get(posts::my_posts))
        .route("/posts/{id}/visibility", patch(posts::set_visibility))
        .route("/posts/{id}", delete(posts::delete_post))
        // Events
        .route("/events", get(events::list_events).post(events::create_event))
        .route("/events/{id}/response", patch(events::respond))
        .route("/events/{id}/responses", get(events::responses))
        .route("/events/{id}/archive", patch(events::archive))
        // Tasks
        .route("/tasks", get(tasks::my_tasks).post(tasks::create_task))
        .route("/tasks/assigned", get(tasks::assigned_tasks))
        .route("/tasks/{id}/status", patch(tasks::update_status))
        // Recognition
        .route(
            "/badges",
            get(recognition::list_badges).post(recognition::create_badge),
        )
        .route("/badges/{id}/award", post(recognition::award_badge))
        .route("/achievements", get(recognition::my_achievements))
        .route(
            "/achievements/{id}/visibility",
            patch(recognition::achievement_visibility),
        )
        .route("/milestones", get(recognition::my_milestones))
        .route(
            "/milestones/{id}/visibility",
            patch(recognition::milestone_visibility),
        )
        .route("/milestones/check", post(recognition::check_my_milestones))
        // Notifications
        .route(
            "/notifications",
            get(notifications::list).post(notifications::create),
        )
        .route("/notifications/{id}/read", patch(notifications::mark_read))
        .route("/notifications/read-all", patch(notifications::mark_all_read))
        .route("/notifications/types", get(notifications::types))
        .route(
            "/notifications/settings",
            get(notifications::settings).put(notifications::update_setting),
        )
        // Metrics and reports
        .route("/metrics/me", get(metrics::my_metrics))
        .route("/metrics/team", get(metrics::team))
        .route("/metrics/snapshots", post(metrics::snapshot_team))
        .route(
            "/metrics/reports",
            get(metrics::list_reports).post(metrics::generate_report),
        )
        .route("/metrics/reports/{id}/download", get(metrics::download_report))
        // Datamind
        .route(
            "/datamind",
            get(datamind::list_datamind).post(datamind::create_datamind),
        )
        .route("/datamind/types", get(datamind::list_types))
        // Admin
        .route("/admin/jobs/{job}/run", post(admin::run_job))
        .merge(uploads)
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                tracing::info_span!("request", method = %req.method(), path = %req.uri().path())
            }),
        )
        .layer(cors)
        .with_state(state)
}
