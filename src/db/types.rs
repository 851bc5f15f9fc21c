//! Shared type definitions for the database layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),
}

impl DbError {
    /// True when the statement failed on a UNIQUE / PRIMARY KEY constraint.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            DbError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => {
                err.code == rusqlite::ErrorCode::ConstraintViolation
                    && (err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
            }
            _ => false,
        }
    }
}

/// A row from the `employees` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbEmployee {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub department_id: Option<String>,
    pub location: Option<String>,
    pub people_leader_id: Option<String>,
    pub is_admin: bool,
    pub is_people_leader: bool,
    pub job_title: Option<String>,
    pub hire_date: Option<String>,
    pub created_at: String,
}

impl DbEmployee {
    /// Compare a login attempt against the stored salted hash.
    pub fn matches_password(&self, candidate: &str) -> bool {
        crate::auth::verify_password(&self.password_hash, candidate)
    }
}

/// A row from `departments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbDepartment {
    pub id: String,
    pub name: String,
}

/// A row from `teams`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbTeam {
    pub id: String,
    pub name: String,
    pub department_id: Option<String>,
}

/// A row from `posts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbPost {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub content: String,
    pub visibility: bool,
    pub is_global: bool,
    pub created_at: String,
    pub updated_at: String,
    /// Joined from `employees` on read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
}

/// A row from `events`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbEvent {
    pub id: String,
    pub creator_id: String,
    pub title: String,
    pub description: Option<String>,
    pub venue: Option<String>,
    pub start_date: String,
    pub end_date: Option<String>,
    pub archived: bool,
    pub is_global: bool,
    pub created_at: String,
}

/// A row from `event_employees` joined with the employee's name.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbEventAttendee {
    pub event_id: String,
    pub employee_id: String,
    pub employee_name: String,
    pub response: Option<String>,
    pub responded_at: Option<String>,
}

/// A row from `notification_types`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbNotificationType {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

/// An employee's effective preference for one notification type.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbNotificationSetting {
    pub noti_type_id: String,
    pub type_name: String,
    pub enabled: bool,
    /// False when no row exists and the default (enabled) applies.
    pub explicit: bool,
}

/// A row from `notifications`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbNotification {
    pub id: String,
    pub recipient_id: String,
    pub noti_type_id: String,
    pub related_entity_id: Option<String>,
    pub message: String,
    pub status: String,
    pub created_at: String,
    pub read_at: Option<String>,
}

/// A row from `badges`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbBadge {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub criteria: Option<String>,
    pub created_at: String,
}

/// A row from `tasks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbTask {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub assigned_to: String,
    pub assigned_by: String,
    pub status: String,
    pub due_date: Option<String>,
    pub created_date: String,
    pub completion_date: Option<String>,
    pub archived: bool,
}

/// A row from `achievements`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbAchievement {
    pub id: String,
    pub employee_id: String,
    pub task_id: Option<String>,
    pub badge_id: Option<String>,
    pub related_entity_id: Option<String>,
    pub title: String,
    pub visibility: bool,
    pub achieved_at: String,
}

/// A row from `milestones`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbMilestone {
    pub id: String,
    pub employee_id: String,
    pub tenure_years: i64,
    pub title: String,
    pub visibility: bool,
    pub achieved_at: String,
}

/// A row from `metrics_snapshots`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbMetricsSnapshot {
    pub id: String,
    pub employee_id: String,
    pub period_start: String,
    pub period_end: String,
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub task_completion_rate: f64,
    pub average_task_speed: f64,
    pub milestones_achieved: i64,
    pub total_achievements: i64,
    pub engagement_score: f64,
    pub created_at: String,
    pub updated_at: String,
}

/// A row from `reports`. `location` is a blob id for PDF reports and a file
/// path for CSV exports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbReport {
    pub id: String,
    pub leader_id: String,
    pub format: String,
    pub location: String,
    pub generated_at: String,
    pub status: String,
}

/// A row from `report_blobs`.
#[derive(Debug, Clone)]
pub struct DbReportBlob {
    pub id: String,
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
    pub created_at: String,
}

/// A row from `datamind_types`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbDatamindType {
    pub id: String,
    pub name: String,
}

/// A row from `datamind` joined with its type name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbDatamind {
    pub id: String,
    pub type_id: String,
    pub type_name: String,
    pub title: String,
    pub content: String,
    pub created_at: String,
}
