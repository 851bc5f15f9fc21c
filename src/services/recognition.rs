// Recognition service: badges, achievements and tenure milestones.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::recognition::BadgeFields;
use crate::db::{DbAchievement, DbBadge, DbEmployee, DbMilestone, DbTask, PulseDb};
use crate::error::ApiError;
use crate::services::notifications::notify_best_effort;
use crate::types::{ACHIEVEMENT_UNLOCKED, BADGE_AWARDED, MILESTONE_REMINDER};
use crate::util::parse_ts;

/// Tenure anniversaries (in whole years) that earn a milestone.
pub const MILESTONE_YEARS: [i64; 8] = [1, 3, 5, 10, 15, 20, 25, 30];

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBadgeRequest {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub criteria: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardBadgeRequest {
    #[serde(default)]
    pub employee_id: String,
    pub related_entity_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneCheck {
    pub employee_id: String,
    pub created: Vec<DbMilestone>,
}

// =============================================================================
// Badges and achievements
// =============================================================================

pub fn create_badge(db: &PulseDb, req: &CreateBadgeRequest) -> Result<DbBadge, ApiError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("Badge name is required".into()));
    }
    let fields = BadgeFields {
        name: name.to_string(),
        description: req.description.clone(),
        icon: req.icon.clone(),
        criteria: req.criteria.clone(),
    };
    db.insert_badge(&fields).map_err(|e| {
        if e.is_unique_violation() {
            ApiError::Validation(format!("Badge '{}' already exists", name))
        } else {
            e.into()
        }
    })
}

/// Award a badge; one achievement per (employee, badge, related entity).
pub fn award_badge(
    db: &PulseDb,
    badge_id: &str,
    req: &AwardBadgeRequest,
) -> Result<DbAchievement, ApiError> {
    if req.employee_id.trim().is_empty() {
        return Err(ApiError::Validation("employeeId is required".into()));
    }
    let badge = db
        .get_badge(badge_id)?
        .ok_or_else(|| ApiError::not_found("Badge"))?;
    let employee = db
        .get_employee(&req.employee_id)?
        .ok_or_else(|| ApiError::not_found("Employee"))?;
    let related = req
        .related_entity_id
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty());

    let achievement = db
        .insert_badge_achievement(&employee.id, &badge.id, related, &badge.name)
        .map_err(|e| {
            if e.is_unique_violation() {
                ApiError::Validation(format!("{} already holds '{}'", employee.name, badge.name))
            } else {
                e.into()
            }
        })?;

    notify_best_effort(
        db,
        &employee.id,
        BADGE_AWARDED,
        Some(&achievement.id),
        &format!("You were awarded the '{}' badge", badge.name),
    );
    Ok(achievement)
}

/// Record the achievement for a completed task once and announce it.
pub fn record_task_completion(
    db: &PulseDb,
    task: &DbTask,
) -> Result<Option<DbAchievement>, ApiError> {
    let title = format!("Completed: {}", task.title);
    let achievement = db.insert_task_achievement(&task.assigned_to, &task.id, &title)?;
    if let Some(ref achievement) = achievement {
        notify_best_effort(
            db,
            &task.assigned_to,
            ACHIEVEMENT_UNLOCKED,
            Some(&achievement.id),
            &format!("Achievement unlocked: {}", title),
        );
    }
    Ok(achievement)
}

pub fn set_achievement_visibility(
    db: &PulseDb,
    achievement_id: &str,
    employee_id: &str,
    visibility: bool,
) -> Result<(), ApiError> {
    if db.set_achievement_visibility(achievement_id, employee_id, visibility)? {
        Ok(())
    } else {
        Err(ApiError::not_found("Achievement"))
    }
}

pub fn set_milestone_visibility(
    db: &PulseDb,
    milestone_id: &str,
    employee_id: &str,
    visibility: bool,
) -> Result<(), ApiError> {
    if db.set_milestone_visibility(milestone_id, employee_id, visibility)? {
        Ok(())
    } else {
        Err(ApiError::not_found("Milestone"))
    }
}

// =============================================================================
// Milestones
// =============================================================================

/// Anniversary date for `years`; Feb 29 hires celebrate on Feb 28.
fn anniversary(hire: NaiveDate, years: i64) -> Option<NaiveDate> {
    let year = hire.year() + i32::try_from(years).ok()?;
    NaiveDate::from_ymd_opt(year, hire.month(), hire.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, hire.month(), 28))
}

/// Milestone buckets reached by `now` for a hire date.
pub fn reached_buckets(hire_date: &str, now: DateTime<Utc>) -> Vec<i64> {
    let Some(hire) = parse_ts(hire_date).map(|dt| dt.date_naive()) else {
        return Vec::new();
    };
    let today = now.date_naive();
    MILESTONE_YEARS
        .iter()
        .copied()
        .filter(|b| anniversary(hire, *b).is_some_and(|d| d <= today))
        .collect()
}

/// Insert every reached, unrecorded milestone for the employee and send a
/// reminder for each. Running it again creates nothing.
pub fn check_milestones(
    db: &PulseDb,
    employee: &DbEmployee,
    now: DateTime<Utc>,
) -> Result<Vec<DbMilestone>, ApiError> {
    let Some(hire_date) = employee.hire_date.as_deref() else {
        return Ok(Vec::new());
    };
    let Some(hire) = parse_ts(hire_date).map(|dt| dt.date_naive()) else {
        log::warn!("Employee {} has unparseable hire date '{}'", employee.id, hire_date);
        return Ok(Vec::new());
    };

    let mut created = Vec::new();
    for years in reached_buckets(hire_date, now) {
        if db.milestone_exists(&employee.id, years)? {
            continue;
        }
        let title = if years == 1 {
            "1 year with the company".to_string()
        } else {
            format!("{} years with the company", years)
        };
        let achieved_at = anniversary(hire, years)
            .map(|d| format!("{}T00:00:00Z", d.format("%Y-%m-%d")))
            .unwrap_or_else(|| crate::util::format_ts(now));
        let milestone = match db.insert_milestone(&employee.id, years, &title, &achieved_at) {
            Ok(m) => m,
            Err(e) if e.is_unique_violation() => continue,
            Err(e) => return Err(e.into()),
        };
        notify_best_effort(
            db,
            &employee.id,
            MILESTONE_REMINDER,
            Some(&milestone.id),
            &format!("Congratulations on {}!", title),
        );
        created.push(milestone);
    }
    Ok(created)
}

/// On-demand check for one employee.
pub fn check_employee_milestones(
    db: &PulseDb,
    employee_id: &str,
    now: DateTime<Utc>,
) -> Result<MilestoneCheck, ApiError> {
    let employee = db
        .get_employee(employee_id)?
        .ok_or_else(|| ApiError::not_found("Employee"))?;
    let created = check_milestones(db, &employee, now)?;
    Ok(MilestoneCheck {
        employee_id: employee.id,
        created,
    })
}

/// Milestone pass over every employee. Returns the number created.
pub fn check_all_milestones(db: &PulseDb, now: DateTime<Utc>) -> Result<usize, ApiError> {
    let mut total = 0;
    for employee in db.get_all_employees()? {
        total += check_milestones(db, &employee, now)?.len();
    }
    Ok(total)
}
