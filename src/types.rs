use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Name of the one notification type whose deliveries fan out to the
/// recipient's people leader.
pub const MILESTONE_REMINDER: &str = "Milestone Reminder";
pub const TASK_ASSIGNMENT: &str = "Task Assignment";
pub const BADGE_AWARDED: &str = "Badge Awarded";
pub const EVENT_INVITATION: &str = "Event Invitation";
pub const ACHIEVEMENT_UNLOCKED: &str = "Achievement Unlocked";

/// Server configuration, loaded from `~/.pulse/config.json` (or `$PULSE_CONFIG`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    /// SQLite file; defaults to `~/.pulse/pulse.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
    /// HMAC key for bearer tokens. When absent a random key is generated at
    /// start-up and tokens do not survive a restart.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_secret: Option<String>,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default)]
    pub default_report_format: ReportFormat,
    #[serde(default = "default_retention_days")]
    pub notification_retention_days: i64,
    #[serde(default)]
    pub schedules: Schedules,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            database_path: None,
            token_secret: None,
            token_ttl_hours: default_token_ttl_hours(),
            report_dir: default_report_dir(),
            upload_dir: default_upload_dir(),
            default_report_format: ReportFormat::default(),
            notification_retention_days: default_retention_days(),
            schedules: Schedules::default(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_token_ttl_hours() -> i64 {
    12
}

fn default_report_dir() -> PathBuf {
    pulse_home().join("reports")
}

fn default_upload_dir() -> PathBuf {
    pulse_home().join("uploads")
}

fn default_retention_days() -> i64 {
    30
}

/// `~/.pulse`, falling back to `./.pulse` when no home directory exists.
pub fn pulse_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".pulse")
}

/// Cron schedules for the background jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedules {
    #[serde(default = "ScheduleEntry::default_archive_events")]
    pub archive_events: ScheduleEntry,
    #[serde(default = "ScheduleEntry::default_notification_cleanup")]
    pub notification_cleanup: ScheduleEntry,
    #[serde(default = "ScheduleEntry::default_milestone_check")]
    pub milestone_check: ScheduleEntry,
    #[serde(default = "ScheduleEntry::default_metrics_snapshot")]
    pub metrics_snapshot: ScheduleEntry,
    #[serde(default = "ScheduleEntry::default_leader_reports")]
    pub leader_reports: ScheduleEntry,
}

impl Default for Schedules {
    fn default() -> Self {
        Self {
            archive_events: ScheduleEntry::default_archive_events(),
            notification_cleanup: ScheduleEntry::default_notification_cleanup(),
            milestone_check: ScheduleEntry::default_milestone_check(),
            metrics_snapshot: ScheduleEntry::default_metrics_snapshot(),
            leader_reports: ScheduleEntry::default_leader_reports(),
        }
    }
}

impl Schedules {
    pub fn entry(&self, job: JobId) -> &ScheduleEntry {
        match job {
            JobId::ArchiveEvents => &self.archive_events,
            JobId::NotificationCleanup => &self.notification_cleanup,
            JobId::MilestoneCheck => &self.milestone_check,
            JobId::MetricsSnapshot => &self.metrics_snapshot,
            JobId::LeaderReports => &self.leader_reports,
        }
    }
}

/// A single schedule entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub enabled: bool,
    pub cron: String,
    pub timezone: String,
}

impl ScheduleEntry {
    fn utc(cron: &str) -> Self {
        Self {
            enabled: true,
            cron: cron.to_string(),
            timezone: "UTC".to_string(),
        }
    }

    /// 00:30 daily
    pub fn default_archive_events() -> Self {
        Self::utc("30 0 * * *")
    }

    /// 01:00 daily
    pub fn default_notification_cleanup() -> Self {
        Self::utc("0 1 * * *")
    }

    /// 06:00 daily
    pub fn default_milestone_check() -> Self {
        Self::utc("0 6 * * *")
    }

    /// Top of every hour
    pub fn default_metrics_snapshot() -> Self {
        Self::utc("0 * * * *")
    }

    /// 07:00 on the first of the month
    pub fn default_leader_reports() -> Self {
        Self::utc("0 7 1 * *")
    }
}

/// Background job identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobId {
    ArchiveEvents,
    NotificationCleanup,
    MilestoneCheck,
    MetricsSnapshot,
    LeaderReports,
}

impl JobId {
    pub const ALL: [JobId; 5] = [
        JobId::ArchiveEvents,
        JobId::NotificationCleanup,
        JobId::MilestoneCheck,
        JobId::MetricsSnapshot,
        JobId::LeaderReports,
    ];
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobId::ArchiveEvents => write!(f, "archive_events"),
            JobId::NotificationCleanup => write!(f, "notification_cleanup"),
            JobId::MilestoneCheck => write!(f, "milestone_check"),
            JobId::MetricsSnapshot => write!(f, "metrics_snapshot"),
            JobId::LeaderReports => write!(f, "leader_reports"),
        }
    }
}

impl std::str::FromStr for JobId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "archive_events" => Ok(JobId::ArchiveEvents),
            "notification_cleanup" => Ok(JobId::NotificationCleanup),
            "milestone_check" => Ok(JobId::MilestoneCheck),
            "metrics_snapshot" => Ok(JobId::MetricsSnapshot),
            "leader_reports" => Ok(JobId::LeaderReports),
            _ => Err(format!("Unknown job: {}", s)),
        }
    }
}

/// What caused a job execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionTrigger {
    Scheduled,
    Missed,
    Manual,
}

/// Persistence backend for a leader report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Pdf,
    Csv,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Csv => "csv",
        }
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pdf" => Ok(ReportFormat::Pdf),
            "csv" => Ok(ReportFormat::Csv),
            _ => Err(format!("Unknown report format: {}", s)),
        }
    }
}

/// Task lifecycle states as stored in `tasks.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Completed => "Completed",
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(TaskStatus::Pending),
            "In Progress" => Ok(TaskStatus::InProgress),
            "Completed" => Ok(TaskStatus::Completed),
            _ => Err(format!("Invalid task status: {}", s)),
        }
    }
}

/// An employee's answer to an event invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventResponse {
    Accepted,
    Declined,
    Pending,
}

impl EventResponse {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventResponse::Accepted => "Accepted",
            EventResponse::Declined => "Declined",
            EventResponse::Pending => "Pending",
        }
    }
}

impl std::str::FromStr for EventResponse {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Accepted" => Ok(EventResponse::Accepted),
            "Declined" => Ok(EventResponse::Declined),
            "Pending" => Ok(EventResponse::Pending),
            _ => Err(format!(
                "Invalid response '{}': expected Accepted, Declined or Pending",
                s
            )),
        }
    }
}

/// Delivery state of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationStatus {
    Pending,
    Sent,
    Read,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "Pending",
            NotificationStatus::Sent => "Sent",
            NotificationStatus::Read => "Read",
        }
    }
}

impl std::str::FromStr for NotificationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(NotificationStatus::Pending),
            "Sent" => Ok(NotificationStatus::Sent),
            "Read" => Ok(NotificationStatus::Read),
            _ => Err(format!("Invalid notification status: {}", s)),
        }
    }
}
