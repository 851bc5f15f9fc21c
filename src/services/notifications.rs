// Notification service: preference-aware delivery with manager fan-out.
// Every caller that notifies someone goes through `create_notification`.

use serde::Serialize;
use thiserror::Error;

use crate::db::{DbError, DbNotification, DbNotificationSetting, PulseDb};
use crate::error::ApiError;
use crate::types::{NotificationStatus, MILESTONE_REMINDER};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Recipient not found")]
    RecipientNotFound,

    #[error("Notification type not found")]
    TypeNotFound,

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<NotificationError> for ApiError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::MissingField(_) => ApiError::Validation(err.to_string()),
            NotificationError::RecipientNotFound | NotificationError::TypeNotFound => {
                ApiError::NotFound(err.to_string())
            }
            NotificationError::Db(e) => ApiError::Db(e),
        }
    }
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum NotificationOutcome {
    #[serde(rename_all = "camelCase")]
    Success {
        notification: DbNotification,
        manager_notification: Option<DbNotification>,
    },
    Skipped,
}

impl NotificationOutcome {
    /// Number of notification records this delivery created.
    pub fn created(&self) -> usize {
        match self {
            NotificationOutcome::Success {
                manager_notification,
                ..
            } => 1 + usize::from(manager_notification.is_some()),
            NotificationOutcome::Skipped => 0,
        }
    }
}

fn required<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str, NotificationError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(NotificationError::MissingField(field))
}

/// Create a notification for `recipient_id`, honoring their opt-out for the
/// type. Milestone reminders are copied to the recipient's people leader
/// unless the leader opted out of that type.
pub fn create_notification(
    db: &PulseDb,
    recipient_id: Option<&str>,
    noti_type_id: Option<&str>,
    related_entity_id: Option<&str>,
    message: Option<&str>,
) -> Result<NotificationOutcome, NotificationError> {
    let recipient_id = required(recipient_id, "recipientId")?;
    let noti_type_id = required(noti_type_id, "notiTypeId")?;
    let message = required(message, "message")?;

    let recipient = db
        .get_employee(recipient_id)?
        .ok_or(NotificationError::RecipientNotFound)?;
    let noti_type = db
        .get_notification_type(noti_type_id)?
        .ok_or(NotificationError::TypeNotFound)?;

    if db.get_notification_setting(&recipient.id, &noti_type.id)? == Some(false) {
        log::debug!(
            "Skipped '{}' notification for {}: disabled by preference",
            noti_type.name,
            recipient.id
        );
        return Ok(NotificationOutcome::Skipped);
    }

    let notification = db.insert_notification(&recipient.id, &noti_type.id, related_entity_id, message)?;

    let mut manager_notification = None;
    if noti_type.name == MILESTONE_REMINDER {
        if let Some(manager_id) = recipient.people_leader_id.as_deref() {
            let manager_enabled = db
                .get_notification_setting(manager_id, &noti_type.id)?
                .unwrap_or(true);
            if manager_enabled {
                let manager_message = format!("{}: {}", recipient.name, message);
                manager_notification = Some(db.insert_notification(
                    manager_id,
                    &noti_type.id,
                    related_entity_id,
                    &manager_message,
                )?);
            } else {
                log::debug!("Manager {} opted out of '{}'", manager_id, noti_type.name);
            }
        }
    }

    Ok(NotificationOutcome::Success {
        notification,
        manager_notification,
    })
}

/// Notify by type name for internal callers (task assignment, badge awards
/// and the like). An unknown type is logged and treated as skipped.
pub fn notify_by_type_name(
    db: &PulseDb,
    recipient_id: &str,
    type_name: &str,
    related_entity_id: Option<&str>,
    message: &str,
) -> Result<NotificationOutcome, NotificationError> {
    let Some(noti_type) = db.get_notification_type_by_name(type_name)? else {
        log::warn!("Notification type '{}' is not seeded; skipping", type_name);
        return Ok(NotificationOutcome::Skipped);
    };
    create_notification(
        db,
        Some(recipient_id),
        Some(&noti_type.id),
        related_entity_id,
        Some(message),
    )
}

/// Best-effort delivery after a write has committed: failures are logged.
pub fn notify_best_effort(
    db: &PulseDb,
    recipient_id: &str,
    type_name: &str,
    related_entity_id: Option<&str>,
    message: &str,
) -> usize {
    match notify_by_type_name(db, recipient_id, type_name, related_entity_id, message) {
        Ok(outcome) => outcome.created(),
        Err(e) => {
            log::warn!(
                "Failed to send '{}' notification to {}: {}",
                type_name,
                recipient_id,
                e
            );
            0
        }
    }
}

// =============================================================================
// Inbox and preferences
// =============================================================================

pub fn list_notifications(
    db: &PulseDb,
    recipient_id: &str,
    status: Option<&str>,
) -> Result<Vec<DbNotification>, ApiError> {
    let status = match status.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(raw.parse::<NotificationStatus>().map_err(ApiError::Validation)?),
        None => None,
    };
    Ok(db.get_notifications_for(recipient_id, status.as_ref().map(NotificationStatus::as_str))?)
}

/// Mark read; another recipient's notification is reported as not found.
pub fn mark_read(db: &PulseDb, notification_id: &str, recipient_id: &str) -> Result<(), ApiError> {
    if db.mark_notification_read(notification_id, recipient_id)? {
        Ok(())
    } else {
        Err(ApiError::not_found("Notification"))
    }
}

pub fn update_setting(
    db: &PulseDb,
    employee_id: &str,
    noti_type_id: &str,
    enabled: bool,
) -> Result<Vec<DbNotificationSetting>, ApiError> {
    if db.get_notification_type(noti_type_id)?.is_none() {
        return Err(ApiError::not_found("Notification type"));
    }
    db.upsert_notification_setting(employee_id, noti_type_id, enabled)?;
    Ok(db.get_notification_settings(employee_id)?)
}
