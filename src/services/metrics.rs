// Metrics service: per-employee task/recognition aggregation and monthly
// snapshots.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::db::metrics::SnapshotValues;
use crate::db::{DbError, DbMetricsSnapshot, DbTask, PulseDb};
use crate::error::ApiError;
use crate::types::TaskStatus;
use crate::util::{format_ts, month_start, parse_ts, round2};

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("No tasks found for the selected period")]
    NoTasks,

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<MetricsError> for ApiError {
    fn from(err: MetricsError) -> Self {
        match err {
            MetricsError::NoTasks => ApiError::NotFound(err.to_string()),
            MetricsError::Db(e) => ApiError::Db(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsData {
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub task_completion_rate: f64,
    pub average_task_speed: f64,
    pub milestones_achieved: i64,
    pub total_achievements: i64,
    pub engagement_score: f64,
}

impl From<MetricsData> for SnapshotValues {
    fn from(m: MetricsData) -> Self {
        SnapshotValues {
            total_tasks: m.total_tasks,
            completed_tasks: m.completed_tasks,
            task_completion_rate: m.task_completion_rate,
            average_task_speed: m.average_task_speed,
            milestones_achieved: m.milestones_achieved,
            total_achievements: m.total_achievements,
            engagement_score: m.engagement_score,
        }
    }
}

/// Outcome of a snapshot pass over several employees.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRun {
    pub snapshots: Vec<DbMetricsSnapshot>,
    /// Employees with no tasks in the current month.
    pub skipped: Vec<String>,
}

/// Days between creation and completion of a completed task.
fn completion_days(task: &DbTask) -> Option<f64> {
    let created = parse_ts(&task.created_date)?;
    let completed = parse_ts(task.completion_date.as_deref()?)?;
    Some((completed - created).num_seconds() as f64 / SECONDS_PER_DAY)
}

/// Aggregate a window's tasks with the all-time recognition counts.
/// Completion rate is 0 for zero tasks and speed is 0 when nothing is done.
pub fn aggregate(tasks: &[DbTask], milestones_achieved: i64, total_achievements: i64) -> MetricsData {
    let total_tasks = tasks.len() as i64;
    let durations: Vec<f64> = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Completed.as_str())
        .filter_map(completion_days)
        .collect();
    let completed_tasks = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Completed.as_str())
        .count() as i64;

    let task_completion_rate = if total_tasks == 0 {
        0.0
    } else {
        round2(completed_tasks as f64 / total_tasks as f64 * 100.0)
    };
    let average_task_speed = if durations.is_empty() {
        0.0
    } else {
        round2(durations.iter().sum::<f64>() / durations.len() as f64)
    };

    MetricsData {
        total_tasks,
        completed_tasks,
        task_completion_rate,
        average_task_speed,
        milestones_achieved,
        total_achievements,
        engagement_score: round2((completed_tasks + milestones_achieved) as f64 / 10.0),
    }
}

/// Metrics for tasks assigned to the employee and created within
/// `[start, end]`.
pub fn calculate_metrics_data(
    db: &PulseDb,
    employee_id: &str,
    start: &str,
    end: &str,
) -> Result<MetricsData, MetricsError> {
    let tasks = db.get_tasks_in_window(employee_id, start, end)?;
    if tasks.is_empty() {
        return Err(MetricsError::NoTasks);
    }
    let milestones = db.count_milestones(employee_id)?;
    let achievements = db.count_achievements(employee_id)?;
    Ok(aggregate(&tasks, milestones, achievements))
}

/// Resolve an optional client window, defaulting to the current month so
/// far. A bare end date covers that whole day.
pub fn resolve_window(
    start: Option<&str>,
    end: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(String, String), ApiError> {
    let start = match start.filter(|s| !s.trim().is_empty()) {
        Some(raw) => parse_ts(raw)
            .ok_or_else(|| ApiError::Validation(format!("Invalid start date: {}", raw)))?,
        None => month_start(now),
    };
    let end = match end.filter(|s| !s.trim().is_empty()) {
        Some(raw) => {
            let parsed = parse_ts(raw)
                .ok_or_else(|| ApiError::Validation(format!("Invalid end date: {}", raw)))?;
            if raw.trim().len() == 10 {
                parsed + Duration::seconds(86_399)
            } else {
                parsed
            }
        }
        None => now,
    };
    if end < start {
        return Err(ApiError::Validation("end is before start".into()));
    }
    Ok((format_ts(start), format_ts(end)))
}

/// Recompute the employee's snapshot for the calendar month of `now`.
pub fn upsert_snapshot(
    db: &PulseDb,
    employee_id: &str,
    now: DateTime<Utc>,
) -> Result<DbMetricsSnapshot, MetricsError> {
    let period_start = format_ts(month_start(now));
    let period_end = format_ts(now);
    let data = calculate_metrics_data(db, employee_id, &period_start, &period_end)?;
    Ok(db.upsert_snapshot(employee_id, &period_start, &period_end, &data.into())?)
}

/// Snapshot each employee; those without tasks this month are skipped.
pub fn snapshot_employees(
    db: &PulseDb,
    employee_ids: &[String],
    now: DateTime<Utc>,
) -> Result<SnapshotRun, MetricsError> {
    let mut run = SnapshotRun::default();
    for employee_id in employee_ids {
        match upsert_snapshot(db, employee_id, now) {
            Ok(snapshot) => run.snapshots.push(snapshot),
            Err(MetricsError::NoTasks) => run.skipped.push(employee_id.clone()),
            Err(e) => return Err(e),
        }
    }
    Ok(run)
}

pub fn snapshot_direct_reports(
    db: &PulseDb,
    leader_id: &str,
    now: DateTime<Utc>,
) -> Result<SnapshotRun, MetricsError> {
    let ids: Vec<String> = db
        .get_direct_reports(leader_id)?
        .into_iter()
        .map(|e| e.id)
        .collect();
    snapshot_employees(db, &ids, now)
}

/// Latest snapshot for each direct report of the leader.
pub fn team_metrics(db: &PulseDb, leader_id: &str) -> Result<Vec<DbMetricsSnapshot>, DbError> {
    let ids: Vec<String> = db
        .get_direct_reports(leader_id)?
        .into_iter()
        .map(|e| e.id)
        .collect();
    db.get_latest_snapshots(&ids)
}
