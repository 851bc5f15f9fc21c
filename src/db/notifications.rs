use super::*;

const NOTIFICATION_COLUMNS: &str =
    "id, recipient_id, noti_type_id, related_entity_id, message, status, created_at, read_at";

impl PulseDb {
    // =========================================================================
    // Notification types and per-employee settings
    // =========================================================================

    pub fn get_notification_type(&self, id: &str) -> Result<Option<DbNotificationType>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, description FROM notification_types WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], Self::map_notification_type_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn get_notification_type_by_name(
        &self,
        name: &str,
    ) -> Result<Option<DbNotificationType>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, description FROM notification_types WHERE name = ?1")?;
        let mut rows = stmt.query_map(params![name], Self::map_notification_type_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn get_all_notification_types(&self) -> Result<Vec<DbNotificationType>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, description FROM notification_types ORDER BY name")?;
        let rows = stmt.query_map([], Self::map_notification_type_row)?;
        let mut types = Vec::new();
        for row in rows {
            types.push(row?);
        }
        Ok(types)
    }

    /// Explicit preference row for (employee, type); `None` when absent.
    pub fn get_notification_setting(
        &self,
        employee_id: &str,
        noti_type_id: &str,
    ) -> Result<Option<bool>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT enabled FROM notification_settings
             WHERE employee_id = ?1 AND noti_type_id = ?2",
        )?;
        let mut rows = stmt.query_map(params![employee_id, noti_type_id], |row| {
            row.get::<_, bool>(0)
        })?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn upsert_notification_setting(
        &self,
        employee_id: &str,
        noti_type_id: &str,
        enabled: bool,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO notification_settings (employee_id, noti_type_id, enabled)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(employee_id, noti_type_id) DO UPDATE SET enabled = excluded.enabled",
            params![employee_id, noti_type_id, enabled],
        )?;
        Ok(())
    }

    /// Effective settings for every type: rows that are absent report the
    /// default (enabled).
    pub fn get_notification_settings(
        &self,
        employee_id: &str,
    ) -> Result<Vec<DbNotificationSetting>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.name, s.enabled
             FROM notification_types t
             LEFT JOIN notification_settings s
               ON s.noti_type_id = t.id AND s.employee_id = ?1
             ORDER BY t.name",
        )?;
        let rows = stmt.query_map(params![employee_id], |row| {
            let enabled: Option<bool> = row.get(2)?;
            Ok(DbNotificationSetting {
                noti_type_id: row.get(0)?,
                type_name: row.get(1)?,
                enabled: enabled.unwrap_or(true),
                explicit: enabled.is_some(),
            })
        })?;
        let mut settings = Vec::new();
        for row in rows {
            settings.push(row?);
        }
        Ok(settings)
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    pub fn insert_notification(
        &self,
        recipient_id: &str,
        noti_type_id: &str,
        related_entity_id: Option<&str>,
        message: &str,
    ) -> Result<DbNotification, DbError> {
        let notification = DbNotification {
            id: new_id(),
            recipient_id: recipient_id.to_string(),
            noti_type_id: noti_type_id.to_string(),
            related_entity_id: related_entity_id.map(str::to_string),
            message: message.to_string(),
            status: crate::types::NotificationStatus::Pending.as_str().to_string(),
            created_at: crate::util::now_ts(),
            read_at: None,
        };
        self.conn.execute(
            "INSERT INTO notifications (id, recipient_id, noti_type_id, related_entity_id,
                                        message, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                notification.id,
                notification.recipient_id,
                notification.noti_type_id,
                notification.related_entity_id,
                notification.message,
                notification.status,
                notification.created_at,
            ],
        )?;
        Ok(notification)
    }

    /// Notifications for a recipient, newest first, optionally by status.
    pub fn get_notifications_for(
        &self,
        recipient_id: &str,
        status: Option<&str>,
    ) -> Result<Vec<DbNotification>, DbError> {
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE recipient_id = ?1 AND (?2 IS NULL OR status = ?2)
             ORDER BY created_at DESC, id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![recipient_id, status], Self::map_notification_row)?;
        let mut notifications = Vec::new();
        for row in rows {
            notifications.push(row?);
        }
        Ok(notifications)
    }

    /// Mark one notification read. Returns false when the recipient does not
    /// own it.
    pub fn mark_notification_read(&self, id: &str, recipient_id: &str) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "UPDATE notifications SET status = 'Read', read_at = COALESCE(read_at, ?3)
             WHERE id = ?1 AND recipient_id = ?2",
            params![id, recipient_id, crate::util::now_ts()],
        )?;
        Ok(changed > 0)
    }

    pub fn mark_all_notifications_read(&self, recipient_id: &str) -> Result<usize, DbError> {
        let changed = self.conn.execute(
            "UPDATE notifications SET status = 'Read', read_at = ?2
             WHERE recipient_id = ?1 AND status != 'Read'",
            params![recipient_id, crate::util::now_ts()],
        )?;
        Ok(changed)
    }

    /// Delete read notifications created before `cutoff`.
    pub fn delete_read_notifications_before(&self, cutoff: &str) -> Result<usize, DbError> {
        let removed = self.conn.execute(
            "DELETE FROM notifications WHERE status = 'Read' AND created_at < ?1",
            params![cutoff],
        )?;
        Ok(removed)
    }

    fn map_notification_type_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbNotificationType> {
        Ok(DbNotificationType {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
        })
    }

    fn map_notification_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbNotification> {
        Ok(DbNotification {
            id: row.get(0)?,
            recipient_id: row.get(1)?,
            noti_type_id: row.get(2)?,
            related_entity_id: row.get(3)?,
            message: row.get(4)?,
            status: row.get(5)?,
            created_at: row.get(6)?,
            read_at: row.get(7)?,
        })
    }
}
