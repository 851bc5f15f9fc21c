// Leader reports: compile the latest snapshots of a leader's direct reports
// and persist the rendered artifact through a selectable sink.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::db::{DbError, DbMetricsSnapshot, DbReport, PulseDb};
use crate::error::ApiError;
use crate::pdf::PdfDocument;
use crate::types::{Config, ReportFormat};
use crate::util::{atomic_write_bytes, format_ts, sanitize_id};

pub const REPORT_STATUS_GENERATED: &str = "Generated";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Leader not found")]
    LeaderNotFound,

    #[error("Leader has no direct reports")]
    NoDirectReports,

    #[error("No metrics snapshots exist for this leader's reports")]
    NoSnapshots,

    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::LeaderNotFound
            | ReportError::NoDirectReports
            | ReportError::NoSnapshots => ApiError::NotFound(err.to_string()),
            ReportError::Io(e) => ApiError::Internal(e.to_string()),
            ReportError::Db(e) => ApiError::Db(e),
        }
    }
}

/// One line of a report: a direct report and their latest snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub employee_name: String,
    pub snapshot: DbMetricsSnapshot,
}

#[derive(Debug, Clone)]
pub struct CompiledReport {
    pub leader_id: String,
    pub leader_name: String,
    pub generated_at: DateTime<Utc>,
    pub rows: Vec<ReportRow>,
}

/// Where a rendered report ends up. `store` returns the location recorded
/// on the report row.
pub trait ReportSink: Send + Sync {
    fn format(&self) -> ReportFormat;
    fn store(&self, db: &PulseDb, report: &CompiledReport) -> Result<String, ReportError>;
}

/// PDF stored in the `report_blobs` bucket; location is the blob id.
pub struct BlobPdfSink;

impl BlobPdfSink {
    pub fn render(report: &CompiledReport) -> Vec<u8> {
        let mut doc = PdfDocument::new(format!(
            "Team engagement report for {} ({})",
            report.leader_name,
            format_ts(report.generated_at)
        ));
        for row in &report.rows {
            let s = &row.snapshot;
            doc.push_paragraph(format!(
                "{}: {} of {} tasks completed ({:.2}%), average completion time {:.2} days, \
                 {} milestones, {} achievements, engagement score {:.2}. Period {} to {}.",
                row.employee_name,
                s.completed_tasks,
                s.total_tasks,
                s.task_completion_rate,
                s.average_task_speed,
                s.milestones_achieved,
                s.total_achievements,
                s.engagement_score,
                s.period_start,
                s.period_end
            ));
        }
        doc.render()
    }
}

impl ReportSink for BlobPdfSink {
    fn format(&self) -> ReportFormat {
        ReportFormat::Pdf
    }

    fn store(&self, db: &PulseDb, report: &CompiledReport) -> Result<String, ReportError> {
        let bytes = Self::render(report);
        let filename = report_filename(report, ReportFormat::Pdf);
        Ok(db.insert_report_blob(&filename, "application/pdf", &bytes)?)
    }
}

/// CSV written under a directory; location is the file path.
pub struct CsvFileSink {
    pub dir: PathBuf,
}

const CSV_HEADER: &str = "employeeId,employeeName,periodStart,periodEnd,totalTasks,completedTasks,\
taskCompletionRate,averageTaskSpeed,milestonesAchieved,totalAchievements,engagementScore";

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

impl CsvFileSink {
    pub fn render(report: &CompiledReport) -> String {
        let mut out = String::from(CSV_HEADER);
        out.push('\n');
        for row in &report.rows {
            let s = &row.snapshot;
            let fields = [
                csv_field(&s.employee_id),
                csv_field(&row.employee_name),
                csv_field(&s.period_start),
                csv_field(&s.period_end),
                s.total_tasks.to_string(),
                s.completed_tasks.to_string(),
                format!("{:.2}", s.task_completion_rate),
                format!("{:.2}", s.average_task_speed),
                s.milestones_achieved.to_string(),
                s.total_achievements.to_string(),
                format!("{:.2}", s.engagement_score),
            ];
            out.push_str(&fields.join(","));
            out.push('\n');
        }
        out
    }
}

impl ReportSink for CsvFileSink {
    fn format(&self) -> ReportFormat {
        ReportFormat::Csv
    }

    fn store(&self, _db: &PulseDb, report: &CompiledReport) -> Result<String, ReportError> {
        let path = self.dir.join(report_filename(report, ReportFormat::Csv));
        atomic_write_bytes(&path, Self::render(report).as_bytes())?;
        Ok(path.to_string_lossy().into_owned())
    }
}

/// `report_<leader>_<timestamp>.<ext>`
fn report_filename(report: &CompiledReport, format: ReportFormat) -> String {
    format!(
        "report_{}_{}.{}",
        sanitize_id(&report.leader_id),
        report.generated_at.format("%Y%m%dT%H%M%SZ"),
        format.as_str()
    )
}

pub fn sink_for(format: ReportFormat, config: &Config) -> Box<dyn ReportSink> {
    match format {
        ReportFormat::Pdf => Box::new(BlobPdfSink),
        ReportFormat::Csv => Box::new(CsvFileSink {
            dir: config.report_dir.clone(),
        }),
    }
}

/// Gather the latest snapshot of every direct report. Fails when there is
/// nothing to report.
pub fn gather_report(
    db: &PulseDb,
    leader_id: &str,
    now: DateTime<Utc>,
) -> Result<CompiledReport, ReportError> {
    let leader = db
        .get_employee(leader_id)?
        .ok_or(ReportError::LeaderNotFound)?;
    let reports = db.get_direct_reports(&leader.id)?;
    if reports.is_empty() {
        return Err(ReportError::NoDirectReports);
    }
    let ids: Vec<String> = reports.iter().map(|e| e.id.clone()).collect();
    let snapshots = db.get_latest_snapshots(&ids)?;
    if snapshots.is_empty() {
        return Err(ReportError::NoSnapshots);
    }
    let rows = snapshots
        .into_iter()
        .map(|snapshot| {
            let employee_name = reports
                .iter()
                .find(|e| e.id == snapshot.employee_id)
                .map(|e| e.name.clone())
                .unwrap_or_default();
            ReportRow {
                employee_name,
                snapshot,
            }
        })
        .collect();
    Ok(CompiledReport {
        leader_id: leader.id,
        leader_name: leader.name,
        generated_at: now,
        rows,
    })
}

/// Compile, store through `sink` and record the report pointer.
pub fn compile_report(
    db: &PulseDb,
    leader_id: &str,
    sink: &dyn ReportSink,
    now: DateTime<Utc>,
) -> Result<DbReport, ReportError> {
    let compiled = gather_report(db, leader_id, now)?;
    let location = sink.store(db, &compiled)?;
    let report = db.insert_report(
        &compiled.leader_id,
        sink.format().as_str(),
        &location,
        &format_ts(now),
        REPORT_STATUS_GENERATED,
    )?;
    log::info!(
        "Generated {} report {} for leader {} ({} rows)",
        report.format,
        report.id,
        report.leader_id,
        compiled.rows.len()
    );
    Ok(report)
}

/// Reports for every people leader. Leaders with nothing to report are
/// skipped. Returns (generated, skipped).
pub fn compile_all_leader_reports(
    db: &PulseDb,
    sink: &dyn ReportSink,
    now: DateTime<Utc>,
) -> Result<(usize, usize), ReportError> {
    let mut generated = 0;
    let mut skipped = 0;
    for leader in db.get_people_leaders()? {
        match compile_report(db, &leader.id, sink, now) {
            Ok(_) => generated += 1,
            Err(ReportError::NoDirectReports | ReportError::NoSnapshots) => {
                log::debug!("No report for leader {}: nothing to report", leader.id);
                skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }
    Ok((generated, skipped))
}

/// A stored report's bytes for download.
#[derive(Debug, Clone)]
pub struct ReportDownload {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Load a report owned by `leader_id`; any other caller gets not-found.
pub fn load_report(
    db: &PulseDb,
    report_id: &str,
    leader_id: &str,
) -> Result<ReportDownload, ApiError> {
    let report = db
        .get_report(report_id)?
        .filter(|r| r.leader_id == leader_id)
        .ok_or_else(|| ApiError::not_found("Report"))?;
    match report.format.parse::<ReportFormat>() {
        Ok(ReportFormat::Pdf) => {
            let blob = db
                .get_report_blob(&report.location)?
                .ok_or_else(|| ApiError::not_found("Report file"))?;
            Ok(ReportDownload {
                filename: blob.filename,
                content_type: blob.content_type,
                data: blob.data,
            })
        }
        Ok(ReportFormat::Csv) => {
            let path = PathBuf::from(&report.location);
            let data = std::fs::read(&path).map_err(|e| {
                log::warn!("Report file {} unreadable: {}", path.display(), e);
                ApiError::not_found("Report file")
            })?;
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("{}.csv", report.id));
            Ok(ReportDownload {
                filename,
                content_type: "text/csv".to_string(),
                data,
            })
        }
        Err(e) => Err(ApiError::Internal(e)),
    }
}
