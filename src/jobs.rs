//! Background jobs and the runner that executes them.
//!
//! The scheduler and the admin endpoint both go through `JobRunner::run`,
//! which holds a single async gate, so runs never overlap whatever
//! triggered them.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

use crate::db::{DbError, PulseDb};
use crate::error::ApiError;
use crate::scheduler::JobMessage;
use crate::services::{metrics, recognition, reports};
use crate::state::AppState;
use crate::types::{Config, ExecutionTrigger, JobId};
use crate::util::format_ts;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job not registered: {0}")]
    NotRegistered(JobId),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Job failed: {0}")]
    Failed(String),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<ApiError> for JobError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Db(e) => JobError::Db(e),
            other => JobError::Failed(other.to_string()),
        }
    }
}

impl From<metrics::MetricsError> for JobError {
    fn from(err: metrics::MetricsError) -> Self {
        match err {
            metrics::MetricsError::Db(e) => JobError::Db(e),
            other => JobError::Failed(other.to_string()),
        }
    }
}

impl From<reports::ReportError> for JobError {
    fn from(err: reports::ReportError) -> Self {
        JobError::Failed(err.to_string())
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::NotRegistered(_) => ApiError::NotFound(err.to_string()),
            JobError::Db(e) => ApiError::Db(e),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Inputs shared by every job run.
pub struct JobContext<'a> {
    pub now: DateTime<Utc>,
    pub config: &'a Config,
    pub trigger: ExecutionTrigger,
}

/// Result of one run, returned to manual callers and logged otherwise.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub job: JobId,
    pub trigger: ExecutionTrigger,
    pub started_at: String,
    pub finished_at: String,
    /// Rows created, updated or deleted by the run.
    pub affected: usize,
    pub detail: String,
}

/// What a run produced, before the runner stamps it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub affected: usize,
    pub detail: String,
}

impl JobOutcome {
    fn new(affected: usize, detail: impl Into<String>) -> Self {
        Self {
            affected,
            detail: detail.into(),
        }
    }
}

pub trait Job: Send + Sync {
    fn id(&self) -> JobId;
    fn run(&self, db: &PulseDb, ctx: &JobContext<'_>) -> Result<JobOutcome, JobError>;
}

// =============================================================================
// Jobs
// =============================================================================

/// Archive events whose date has passed.
pub struct ArchiveEventsJob;

impl Job for ArchiveEventsJob {
    fn id(&self) -> JobId {
        JobId::ArchiveEvents
    }

    fn run(&self, db: &PulseDb, ctx: &JobContext<'_>) -> Result<JobOutcome, JobError> {
        let archived = db.archive_past_events(&format_ts(ctx.now))?;
        Ok(JobOutcome::new(archived, format!("{} events archived", archived)))
    }
}

/// Delete Read notifications older than the retention window.
pub struct NotificationCleanupJob;

impl Job for NotificationCleanupJob {
    fn id(&self) -> JobId {
        JobId::NotificationCleanup
    }

    fn run(&self, db: &PulseDb, ctx: &JobContext<'_>) -> Result<JobOutcome, JobError> {
        let days = ctx.config.notification_retention_days;
        if days < 0 {
            return Err(JobError::Configuration(format!(
                "notificationRetentionDays must not be negative (got {})",
                days
            )));
        }
        let cutoff = Duration::try_days(days)
            .and_then(|window| ctx.now.checked_sub_signed(window))
            .map(format_ts)
            .ok_or_else(|| {
                JobError::Configuration(format!(
                    "notificationRetentionDays is out of range (got {})",
                    days
                ))
            })?;
        let deleted = db.delete_read_notifications_before(&cutoff)?;
        Ok(JobOutcome::new(
            deleted,
            format!("{} read notifications older than {} deleted", deleted, cutoff),
        ))
    }
}

/// Create tenure milestones reached since the last pass.
pub struct MilestoneCheckJob;

impl Job for MilestoneCheckJob {
    fn id(&self) -> JobId {
        JobId::MilestoneCheck
    }

    fn run(&self, db: &PulseDb, ctx: &JobContext<'_>) -> Result<JobOutcome, JobError> {
        let created = recognition::check_all_milestones(db, ctx.now)?;
        Ok(JobOutcome::new(created, format!("{} milestones created", created)))
    }
}

/// Refresh the current month's snapshot for every employee.
pub struct MetricsSnapshotJob;

impl Job for MetricsSnapshotJob {
    fn id(&self) -> JobId {
        JobId::MetricsSnapshot
    }

    fn run(&self, db: &PulseDb, ctx: &JobContext<'_>) -> Result<JobOutcome, JobError> {
        let ids: Vec<String> = db.get_all_employees()?.into_iter().map(|e| e.id).collect();
        let run = metrics::snapshot_employees(db, &ids, ctx.now)?;
        Ok(JobOutcome::new(
            run.snapshots.len(),
            format!(
                "{} snapshots written, {} employees without tasks",
                run.snapshots.len(),
                run.skipped.len()
            ),
        ))
    }
}

/// Compile a report for every people leader in the configured format.
pub struct LeaderReportsJob;

impl Job for LeaderReportsJob {
    fn id(&self) -> JobId {
        JobId::LeaderReports
    }

    fn run(&self, db: &PulseDb, ctx: &JobContext<'_>) -> Result<JobOutcome, JobError> {
        let format = ctx.config.default_report_format;
        let sink = reports::sink_for(format, ctx.config);
        let (generated, skipped) = reports::compile_all_leader_reports(db, sink.as_ref(), ctx.now)?;
        Ok(JobOutcome::new(
            generated,
            format!(
                "{} {} reports generated, {} leaders skipped",
                generated,
                format.as_str(),
                skipped
            ),
        ))
    }
}

// =============================================================================
// Runner
// =============================================================================

/// Registry of jobs plus the gate that serializes their execution.
pub struct JobRunner {
    jobs: BTreeMap<JobId, Arc<dyn Job>>,
    gate: Mutex<()>,
}

impl JobRunner {
    pub fn new() -> Self {
        Self {
            jobs: BTreeMap::new(),
            gate: Mutex::new(()),
        }
    }

    pub fn with_default_jobs() -> Self {
        let mut runner = Self::new();
        runner.register(Arc::new(ArchiveEventsJob));
        runner.register(Arc::new(NotificationCleanupJob));
        runner.register(Arc::new(MilestoneCheckJob));
        runner.register(Arc::new(MetricsSnapshotJob));
        runner.register(Arc::new(LeaderReportsJob));
        runner
    }

    pub fn register(&mut self, job: Arc<dyn Job>) {
        self.jobs.insert(job.id(), job);
    }

    pub fn registered(&self) -> Vec<JobId> {
        self.jobs.keys().copied().collect()
    }

    /// Execute one job on the blocking pool. Waits for any run in progress.
    pub async fn run(
        &self,
        job_id: JobId,
        state: &Arc<AppState>,
        trigger: ExecutionTrigger,
    ) -> Result<JobReport, JobError> {
        let job = self
            .jobs
            .get(&job_id)
            .cloned()
            .ok_or(JobError::NotRegistered(job_id))?;

        let _guard = self.gate.lock().await;
        let started_at = Utc::now();
        log::info!("Running job {} (trigger: {:?})", job_id, trigger);

        let state = Arc::clone(state);
        let outcome = tokio::task::spawn_blocking(move || {
            let db = state.db.lock();
            let ctx = JobContext {
                now: started_at,
                config: &state.config,
                trigger,
            };
            job.run(&db, &ctx)
        })
        .await
        .map_err(|e| JobError::Failed(format!("job task panicked: {}", e)))??;

        let finished_at = Utc::now();
        log::info!(
            "Job {} finished in {} ms: {}",
            job_id,
            (finished_at - started_at).num_milliseconds(),
            outcome.detail
        );
        Ok(JobReport {
            job: job_id,
            trigger,
            started_at: format_ts(started_at),
            finished_at: format_ts(finished_at),
            affected: outcome.affected,
            detail: outcome.detail,
        })
    }
}

impl Default for JobRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Consume scheduler messages until the channel closes.
pub async fn run_job_loop(state: Arc<AppState>, mut receiver: mpsc::Receiver<JobMessage>) {
    while let Some(msg) = receiver.recv().await {
        if let Err(e) = state.jobs.run(msg.job, &state, msg.trigger).await {
            log::error!("Job {} failed: {}", msg.job, e);
        }
    }
    log::info!("Job channel closed, runner stopping");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::*;
    use crate::state::test_state::test_app_state;
    use crate::util::parse_ts;
    use rusqlite::params;

    fn ctx<'a>(config: &'a Config, now: &str) -> JobContext<'a> {
        JobContext {
            now: parse_ts(now).expect("timestamp"),
            config,
            trigger: ExecutionTrigger::Manual,
        }
    }

    #[test]
    fn test_notification_cleanup_respects_retention() {
        let db = test_db();
        let emp = seed_employee(&db, "Ana", None, None, None);
        let type_id = db
            .get_all_notification_types()
            .expect("types")
            .remove(0)
            .id;
        for (status, created) in [
            ("Read", "2026-08-01T00:00:00Z"),
            ("Read", "2026-10-15T00:00:00Z"),
            ("Sent", "2026-08-01T00:00:00Z"),
        ] {
            db.conn_ref()
                .execute(
                    "INSERT INTO notifications (id, recipient_id, noti_type_id, message, status, created_at)
                     VALUES (?1, ?2, ?3, 'x', ?4, ?5)",
                    params![crate::db::new_id(), emp, type_id, status, created],
                )
                .expect("insert");
        }

        let config = Config {
            notification_retention_days: 30,
            ..Config::default()
        };
        let outcome = NotificationCleanupJob
            .run(&db, &ctx(&config, "2026-10-18T00:00:00Z"))
            .expect("cleanup");
        assert_eq!(outcome.affected, 1);
        assert_eq!(db.get_notifications_for(&emp, None).expect("list").len(), 2);

        let bad = Config {
            notification_retention_days: -1,
            ..Config::default()
        };
        assert!(matches!(
            NotificationCleanupJob.run(&db, &ctx(&bad, "2026-10-18T00:00:00Z")),
            Err(JobError::Configuration(_))
        ));

        let huge = Config {
            notification_retention_days: i64::MAX,
            ..Config::default()
        };
        assert!(matches!(
            NotificationCleanupJob.run(&db, &ctx(&huge, "2026-10-18T00:00:00Z")),
            Err(JobError::Configuration(_))
        ));
    }

    #[test]
    fn test_milestone_job_is_idempotent() {
        let db = test_db();
        let emp = seed_employee(&db, "Veteran", None, None, None);
        db.conn_ref()
            .execute(
                "UPDATE employees SET hire_date = '2020-01-10T00:00:00Z' WHERE id = ?1",
                params![emp],
            )
            .expect("hire date");
        let config = Config::default();
        let first = MilestoneCheckJob
            .run(&db, &ctx(&config, "2026-10-18T00:00:00Z"))
            .expect("first pass");
        assert_eq!(first.affected, 3);
        let second = MilestoneCheckJob
            .run(&db, &ctx(&config, "2026-10-18T00:00:00Z"))
            .expect("second pass");
        assert_eq!(second.affected, 0);
    }

    #[test]
    fn test_default_registry_covers_every_job() {
        let runner = JobRunner::with_default_jobs();
        assert_eq!(runner.registered(), JobId::ALL.to_vec());
        assert!(JobRunner::new().registered().is_empty());
    }

    #[tokio::test]
    async fn test_runner_reports_manual_run() {
        let state = test_app_state();
        let report = state
            .jobs
            .run(JobId::ArchiveEvents, &state, ExecutionTrigger::Manual)
            .await
            .expect("run");
        assert_eq!(report.job, JobId::ArchiveEvents);
        assert_eq!(report.affected, 0);
        assert_eq!(report.trigger, ExecutionTrigger::Manual);
    }

    #[tokio::test]
    async fn test_unregistered_job_is_not_found() {
        let state = test_app_state();
        let err = JobRunner::new()
            .run(JobId::LeaderReports, &state, ExecutionTrigger::Manual)
            .await
            .expect_err("empty registry");
        assert!(matches!(ApiError::from(err), ApiError::NotFound(_)));
    }
}
