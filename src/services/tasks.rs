// Tasks service: assignment, status transitions and completion rewards.

use serde::{Deserialize, Serialize};

use crate::db::{DbAchievement, DbTask, PulseDb};
use crate::error::ApiError;
use crate::services::notifications::notify_best_effort;
use crate::services::recognition::record_task_completion;
use crate::types::{TaskStatus, TASK_ASSIGNMENT};
use crate::util::{format_ts, parse_ts};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub assigned_to: String,
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    pub task: DbTask,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub achievement: Option<DbAchievement>,
}

pub fn create_task(
    db: &PulseDb,
    assigned_by: &str,
    req: &CreateTaskRequest,
    now: &str,
) -> Result<DbTask, ApiError> {
    let title = req.title.trim();
    if title.is_empty() || req.assigned_to.trim().is_empty() {
        return Err(ApiError::Validation("title and assignedTo are required".into()));
    }
    let due_date = match req.due_date.as_deref().filter(|d| !d.trim().is_empty()) {
        Some(raw) => Some(format_ts(parse_ts(raw).ok_or_else(|| {
            ApiError::Validation("dueDate must be a date or RFC 3339 timestamp".into())
        })?)),
        None => None,
    };
    let assignee = db
        .get_employee(req.assigned_to.trim())?
        .ok_or_else(|| ApiError::not_found("Assignee"))?;

    let task = db.insert_task(
        title,
        req.description.as_deref(),
        &assignee.id,
        assigned_by,
        due_date.as_deref(),
        now,
    )?;
    notify_best_effort(
        db,
        &assignee.id,
        TASK_ASSIGNMENT,
        Some(&task.id),
        &format!("New task assigned: {}", task.title),
    );
    log::info!("Task {} assigned to {} by {}", task.id, assignee.id, assigned_by);
    Ok(task)
}

pub fn list_my_tasks(
    db: &PulseDb,
    employee_id: &str,
    status: Option<&str>,
) -> Result<Vec<DbTask>, ApiError> {
    let status = status
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<TaskStatus>().map_err(ApiError::Validation))
        .transpose()?;
    Ok(db.get_tasks_for_assignee(employee_id, status.map(|s| s.as_str()))?)
}

/// Move a task assigned to the caller to a new status. Completing it stamps
/// the completion date and records the task achievement once.
pub fn update_task_status(
    db: &PulseDb,
    task_id: &str,
    employee_id: &str,
    raw_status: &str,
    now: &str,
) -> Result<TaskUpdate, ApiError> {
    let status: TaskStatus = raw_status.parse().map_err(ApiError::Validation)?;
    let completion_date = (status == TaskStatus::Completed).then_some(now);

    if !db.update_task_status(task_id, employee_id, status.as_str(), completion_date)? {
        return Err(ApiError::not_found("Task"));
    }
    let task = db
        .get_task(task_id)?
        .ok_or_else(|| ApiError::not_found("Task"))?;

    let achievement = if status == TaskStatus::Completed {
        record_task_completion(db, &task)?
    } else {
        None
    };
    Ok(TaskUpdate { task, achievement })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::*;

    const NOW: &str = "2026-10-18T09:00:00Z";

    fn request(assigned_to: &str) -> CreateTaskRequest {
        CreateTaskRequest {
            title: "Write onboarding doc".into(),
            description: None,
            assigned_to: assigned_to.into(),
            due_date: Some("2026-10-30".into()),
        }
    }

    #[test]
    fn test_assignment_notifies_assignee() {
        let db = test_db();
        let boss = seed_employee(&db, "Boss", None, None, None);
        let emp = seed_employee(&db, "Ana", None, None, Some(&boss));
        let task = create_task(&db, &boss, &request(&emp), NOW).expect("task");
        assert_eq!(task.due_date.as_deref(), Some("2026-10-30T00:00:00Z"));
        let notes = db.get_notifications_for(&emp, None).expect("notes");
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].related_entity_id.as_deref(), Some(task.id.as_str()));
        assert!(db.get_notifications_for(&boss, None).expect("boss").is_empty());

        assert!(matches!(
            create_task(&db, &boss, &request("ghost"), NOW),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn test_completion_records_achievement_once() {
        let db = test_db();
        let boss = seed_employee(&db, "Boss", None, None, None);
        let emp = seed_employee(&db, "Ana", None, None, Some(&boss));
        let task = create_task(&db, &boss, &request(&emp), NOW).expect("task");

        let first = update_task_status(&db, &task.id, &emp, "Completed", NOW).expect("complete");
        assert!(first.achievement.is_some());
        assert_eq!(first.task.completion_date.as_deref(), Some(NOW));

        update_task_status(&db, &task.id, &emp, "In Progress", NOW).expect("reopen");
        let again = update_task_status(&db, &task.id, &emp, "Completed", NOW).expect("again");
        assert!(again.achievement.is_none());
        assert_eq!(db.count_achievements(&emp).expect("count"), 1);
    }

    #[test]
    fn test_repeat_completion_keeps_first_date() {
        let db = test_db();
        let boss = seed_employee(&db, "Boss", None, None, None);
        let emp = seed_employee(&db, "Ana", None, None, Some(&boss));
        let task = create_task(&db, &boss, &request(&emp), "2026-10-01T00:00:00Z").expect("task");

        update_task_status(&db, &task.id, &emp, "Completed", "2026-10-02T00:00:00Z")
            .expect("complete");
        let repeat = update_task_status(&db, &task.id, &emp, "Completed", "2026-10-20T00:00:00Z")
            .expect("repeat");
        assert_eq!(
            repeat.task.completion_date.as_deref(),
            Some("2026-10-02T00:00:00Z")
        );

        update_task_status(&db, &task.id, &emp, "Pending", "2026-10-21T00:00:00Z").expect("reopen");
        let reopened = update_task_status(&db, &task.id, &emp, "Completed", "2026-10-22T00:00:00Z")
            .expect("complete again");
        assert_eq!(
            reopened.task.completion_date.as_deref(),
            Some("2026-10-22T00:00:00Z")
        );
    }

    #[test]
    fn test_status_rules() {
        let db = test_db();
        let boss = seed_employee(&db, "Boss", None, None, None);
        let emp = seed_employee(&db, "Ana", None, None, Some(&boss));
        let task = create_task(&db, &boss, &request(&emp), NOW).expect("task");

        assert!(matches!(
            update_task_status(&db, &task.id, &emp, "Done", NOW),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            update_task_status(&db, &task.id, &boss, "Completed", NOW),
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            list_my_tasks(&db, &emp, Some("Later")),
            Err(ApiError::Validation(_))
        ));
        assert_eq!(list_my_tasks(&db, &emp, Some("Pending")).expect("list").len(), 1);
    }
}
