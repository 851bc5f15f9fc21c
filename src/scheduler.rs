//! Scheduler for cron-based background jobs
//!
//! Manages scheduled jobs with support for:
//! - Cron expression parsing
//! - Timezone-aware scheduling
//! - Sleep/wake detection via time-jump polling
//! - Missed job handling (runs if within grace period)

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use tokio::sync::mpsc;

use crate::jobs::JobError;
use crate::state::AppState;
use crate::types::{ExecutionTrigger, JobId, ScheduleEntry};

/// Grace period for missed jobs (2 hours)
const MISSED_JOB_GRACE_PERIOD_SECS: i64 = 7200;

/// Extended grace period for the monthly report job (24 hours)
const MISSED_MONTHLY_JOB_GRACE_PERIOD_SECS: i64 = 86400;

/// Time jump threshold to detect sleep/wake (5 minutes)
const TIME_JUMP_THRESHOLD_SECS: i64 = 300;

/// Poll interval for scheduler loop (1 minute)
const POLL_INTERVAL_SECS: u64 = 60;

/// Message sent to trigger a job run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobMessage {
    pub job: JobId,
    pub trigger: ExecutionTrigger,
}

/// Scheduler for managing job execution times
pub struct Scheduler {
    state: Arc<AppState>,
    sender: mpsc::Sender<JobMessage>,
}

impl Scheduler {
    pub fn new(state: Arc<AppState>, sender: mpsc::Sender<JobMessage>) -> Self {
        Self { state, sender }
    }

    /// Start the scheduler loop
    ///
    /// This runs indefinitely, checking for due jobs every minute.
    /// It also handles sleep/wake detection.
    pub async fn run(&self) {
        self.log_invalid_entries();
        let mut last_check = Utc::now();

        loop {
            tokio::time::sleep(Duration::from_secs(POLL_INTERVAL_SECS)).await;

            let now = Utc::now();

            // Detect sleep: time jumped more than 5 minutes
            let time_jump = (now - last_check).num_seconds();
            if time_jump > TIME_JUMP_THRESHOLD_SECS {
                log::info!(
                    "Detected system wake (time jumped {} seconds), checking for missed jobs",
                    time_jump
                );
                self.check_missed_jobs(now).await;
            }

            self.check_and_run_due_jobs(now).await;

            last_check = now;
        }
    }

    /// Surface broken cron or timezone settings once at start-up instead of
    /// silently never firing.
    fn log_invalid_entries(&self) {
        for job in JobId::ALL {
            let entry = self.state.config.schedules.entry(job);
            if !entry.enabled {
                log::info!("Job {} is disabled", job);
                continue;
            }
            match get_next_run_time(entry) {
                Ok(next) => log::info!("Job {} next runs at {}", job, next),
                Err(e) => log::error!("Job {} will not run: {}", job, e),
            }
        }
    }

    /// Check for jobs that should run now
    async fn check_and_run_due_jobs(&self, now: DateTime<Utc>) {
        for job in JobId::ALL {
            let entry = self.state.config.schedules.entry(job);
            if !entry.enabled {
                continue;
            }
            match self.due_at(entry, job, now) {
                Ok(Some(scheduled)) => {
                    self.trigger_job(job, ExecutionTrigger::Scheduled, scheduled)
                        .await
                }
                Ok(None) => {}
                Err(e) => log::debug!("Skipping job {}: {}", job, e),
            }
        }
    }

    /// The scheduled time `job` should run for, when it falls within two
    /// minutes of `now` and has not been sent yet.
    fn due_at(
        &self,
        entry: &ScheduleEntry,
        job: JobId,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, JobError> {
        let schedule = parse_cron(&entry.cron)?;
        let tz = parse_timezone(&entry.timezone)?;
        Ok(due_time(
            &schedule,
            tz,
            now,
            self.state.get_last_scheduled_run(job),
        ))
    }

    /// Check for jobs that were missed during sleep
    async fn check_missed_jobs(&self, now: DateTime<Utc>) {
        for job in JobId::ALL {
            let entry = self.state.config.schedules.entry(job);
            if !entry.enabled {
                continue;
            }
            if let Ok(Some(scheduled)) = self.find_missed_job(entry, job, now) {
                log::info!("Found missed '{}' job, running now", job);
                self.trigger_job(job, ExecutionTrigger::Missed, scheduled)
                    .await;
            }
        }
    }

    /// Find a missed job within the grace period.
    /// The monthly report job uses an extended 24-hour grace period.
    fn find_missed_job(
        &self,
        entry: &ScheduleEntry,
        job: JobId,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, JobError> {
        let schedule = parse_cron(&entry.cron)?;
        let tz = parse_timezone(&entry.timezone)?;
        let grace_secs = match job {
            JobId::LeaderReports => MISSED_MONTHLY_JOB_GRACE_PERIOD_SECS,
            _ => MISSED_JOB_GRACE_PERIOD_SECS,
        };
        Ok(missed_time(
            &schedule,
            tz,
            now,
            grace_secs,
            self.state.get_last_scheduled_run(job),
        ))
    }

    /// Queue a job run and remember which scheduled time it covers, so the
    /// next poll does not send it again while it waits in the queue.
    async fn trigger_job(&self, job: JobId, trigger: ExecutionTrigger, scheduled: DateTime<Utc>) {
        self.state.set_last_scheduled_run(job, scheduled);
        if self
            .sender
            .send(JobMessage { job, trigger })
            .await
            .is_err()
        {
            log::error!("Failed to send scheduler message for {}", job);
        }
    }
}

/// Next scheduled time within two minutes of `now` that `last_run` does not
/// already cover.
fn due_time(
    schedule: &Schedule,
    tz: Tz,
    now: DateTime<Utc>,
    last_run: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    let now_local = now.with_timezone(&tz);
    let next_utc = schedule
        .after(&(now_local - chrono::Duration::minutes(2)))
        .next()?
        .with_timezone(&Utc);

    if (now - next_utc).num_seconds().abs() >= 120 {
        return None;
    }
    if let Some(last) = last_run {
        if (last - next_utc).num_seconds().abs() < 60 {
            return None;
        }
    }
    Some(next_utc)
}

/// Earliest scheduled time inside the grace window that has not run yet.
fn missed_time(
    schedule: &Schedule,
    tz: Tz,
    now: DateTime<Utc>,
    grace_secs: i64,
    last_run: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    let grace_start = now.with_timezone(&tz) - chrono::Duration::seconds(grace_secs);

    for scheduled in schedule.after(&grace_start) {
        let scheduled_utc = scheduled.with_timezone(&Utc);
        if scheduled_utc > now {
            break;
        }
        if matches!(last_run, Some(last) if last >= scheduled_utc) {
            continue;
        }
        return Some(scheduled_utc);
    }
    None
}

/// Parse a cron expression
pub fn parse_cron(expr: &str) -> Result<Schedule, JobError> {
    // The cron crate expects 6 fields (with seconds), but we use 5-field format
    // Add "0" for seconds at the start
    let full_expr = format!("0 {}", expr);

    full_expr.parse::<Schedule>().map_err(|e| {
        JobError::Configuration(format!("Invalid cron expression '{}': {}", expr, e))
    })
}

fn parse_timezone(name: &str) -> Result<Tz, JobError> {
    name.parse()
        .map_err(|_| JobError::Configuration(format!("Invalid timezone: {}", name)))
}

/// Get the next scheduled time for a job
pub fn get_next_run_time(entry: &ScheduleEntry) -> Result<DateTime<Utc>, JobError> {
    let schedule = parse_cron(&entry.cron)?;
    let tz = parse_timezone(&entry.timezone)?;
    let next = schedule
        .upcoming(tz)
        .next()
        .ok_or_else(|| JobError::Configuration("No upcoming scheduled time".to_string()))?;

    Ok(next.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::parse_ts;

    fn at(raw: &str) -> DateTime<Utc> {
        parse_ts(raw).expect("timestamp")
    }

    #[test]
    fn test_parse_cron_daily() {
        assert!(parse_cron("30 0 * * *").is_ok());
    }

    #[test]
    fn test_parse_cron_monthly() {
        assert!(parse_cron("0 7 1 * *").is_ok());
    }

    #[test]
    fn test_parse_cron_invalid() {
        assert!(matches!(
            parse_cron("not a cron"),
            Err(JobError::Configuration(_))
        ));
    }

    #[test]
    fn test_get_next_run_time() {
        let entry = ScheduleEntry {
            enabled: true,
            cron: "0 6 * * *".to_string(),
            timezone: "Europe/Lisbon".to_string(),
        };
        assert!(get_next_run_time(&entry).is_ok());

        let bad_tz = ScheduleEntry {
            timezone: "Mars/Olympus".to_string(),
            ..entry
        };
        assert!(get_next_run_time(&bad_tz).is_err());
    }

    #[test]
    fn test_due_time_fires_once_per_slot() {
        let schedule = parse_cron("0 6 * * *").expect("cron");
        let now = at("2026-10-18T06:00:30Z");

        let due = due_time(&schedule, chrono_tz::UTC, now, None);
        assert_eq!(due, Some(at("2026-10-18T06:00:00Z")));

        // Already sent for this slot.
        assert_eq!(due_time(&schedule, chrono_tz::UTC, now, due), None);

        // Far from any slot.
        assert_eq!(
            due_time(&schedule, chrono_tz::UTC, at("2026-10-18T09:00:00Z"), None),
            None
        );
    }

    #[test]
    fn test_due_time_honours_timezone() {
        // 06:00 in Lisbon is 05:00 UTC during summer time.
        let schedule = parse_cron("0 6 * * *").expect("cron");
        let tz: Tz = "Europe/Lisbon".parse().expect("tz");
        assert_eq!(
            due_time(&schedule, tz, at("2026-07-01T05:00:10Z"), None),
            Some(at("2026-07-01T05:00:00Z"))
        );
        assert_eq!(due_time(&schedule, tz, at("2026-07-01T06:00:10Z"), None), None);
    }

    #[test]
    fn test_missed_time_within_grace() {
        let schedule = parse_cron("0 6 * * *").expect("cron");
        let now = at("2026-10-18T07:30:00Z");

        assert_eq!(
            missed_time(&schedule, chrono_tz::UTC, now, MISSED_JOB_GRACE_PERIOD_SECS, None),
            Some(at("2026-10-18T06:00:00Z"))
        );
        assert_eq!(
            missed_time(
                &schedule,
                chrono_tz::UTC,
                now,
                MISSED_JOB_GRACE_PERIOD_SECS,
                Some(at("2026-10-18T06:00:00Z"))
            ),
            None
        );
        // Outside the two-hour window.
        assert_eq!(
            missed_time(
                &schedule,
                chrono_tz::UTC,
                at("2026-10-18T09:30:00Z"),
                MISSED_JOB_GRACE_PERIOD_SECS,
                None
            ),
            None
        );
    }
}
