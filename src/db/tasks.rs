use super::*;

const TASK_COLUMNS: &str = "id, title, description, assigned_to, assigned_by, status, due_date,
     created_date, completion_date, archived";

impl PulseDb {
    // =========================================================================
    // Tasks
    // =========================================================================

    pub fn insert_task(
        &self,
        title: &str,
        description: Option<&str>,
        assigned_to: &str,
        assigned_by: &str,
        due_date: Option<&str>,
        created_date: &str,
    ) -> Result<DbTask, DbError> {
        let id = new_id();
        self.conn.execute(
            "INSERT INTO tasks (id, title, description, assigned_to, assigned_by, status,
                                due_date, created_date, archived)
             VALUES (?1, ?2, ?3, ?4, ?5, 'Pending', ?6, ?7, 0)",
            params![id, title, description, assigned_to, assigned_by, due_date, created_date],
        )?;
        self.get_task(&id)?
            .ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    pub fn get_task(&self, id: &str) -> Result<Option<DbTask>, DbError> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![id], Self::map_task_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Non-archived tasks assigned to an employee, optionally by status.
    pub fn get_tasks_for_assignee(
        &self,
        assigned_to: &str,
        status: Option<&str>,
    ) -> Result<Vec<DbTask>, DbError> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE assigned_to = ?1 AND archived = 0 AND (?2 IS NULL OR status = ?2)
             ORDER BY CASE WHEN due_date IS NULL THEN 1 ELSE 0 END, due_date, created_date"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![assigned_to, status], Self::map_task_row)?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?);
        }
        Ok(tasks)
    }

    pub fn get_tasks_assigned_by(&self, assigned_by: &str) -> Result<Vec<DbTask>, DbError> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE assigned_by = ?1 AND archived = 0
             ORDER BY created_date DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![assigned_by], Self::map_task_row)?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?);
        }
        Ok(tasks)
    }

    /// Tasks assigned to the employee whose `created_date` lies in
    /// `[start, end]` (archived included: they still count toward metrics).
    pub fn get_tasks_in_window(
        &self,
        assigned_to: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<DbTask>, DbError> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE assigned_to = ?1 AND created_date >= ?2 AND created_date <= ?3
             ORDER BY created_date"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![assigned_to, start, end], Self::map_task_row)?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?);
        }
        Ok(tasks)
    }

    /// Set the status of a task assigned to `assigned_to`. Completing stamps
    /// `completion_date` unless the task is already Completed, in which case
    /// the original date stays; any other status clears it. Returns false
    /// when the task is not assigned to that employee.
    pub fn update_task_status(
        &self,
        id: &str,
        assigned_to: &str,
        status: &str,
        completion_date: Option<&str>,
    ) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "UPDATE tasks SET
                completion_date = CASE
                    WHEN status = 'Completed' AND ?3 = 'Completed' THEN completion_date
                    ELSE ?4
                END,
                status = ?3
             WHERE id = ?1 AND assigned_to = ?2",
            params![id, assigned_to, status, completion_date],
        )?;
        Ok(changed > 0)
    }

    fn map_task_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbTask> {
        Ok(DbTask {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            assigned_to: row.get(3)?,
            assigned_by: row.get(4)?,
            status: row.get(5)?,
            due_date: row.get(6)?,
            created_date: row.get(7)?,
            completion_date: row.get(8)?,
            archived: row.get(9)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use super::*;

    #[test]
    fn test_window_bounds_inclusive() {
        let db = test_db();
        let boss = seed_employee(&db, "Boss", None, None, None);
        let emp = seed_employee(&db, "Emp", None, None, Some(&boss));
        for created in [
            "2026-09-30T23:59:59Z",
            "2026-10-01T00:00:00Z",
            "2026-10-15T12:00:00Z",
            "2026-10-31T23:59:59Z",
            "2026-11-01T00:00:00Z",
        ] {
            db.insert_task("t", None, &emp, &boss, None, created).expect("task");
        }
        let tasks = db
            .get_tasks_in_window(&emp, "2026-10-01T00:00:00Z", "2026-10-31T23:59:59Z")
            .expect("window");
        assert_eq!(tasks.len(), 3);
    }

    #[test]
    fn test_status_update_requires_assignee() {
        let db = test_db();
        let boss = seed_employee(&db, "Boss", None, None, None);
        let emp = seed_employee(&db, "Emp", None, None, Some(&boss));
        let task = db
            .insert_task("Ship it", None, &emp, &boss, None, "2026-10-01T00:00:00Z")
            .expect("task");
        assert!(!db
            .update_task_status(&task.id, &boss, "Completed", Some("2026-10-02T00:00:00Z"))
            .expect("update"));
        assert!(db
            .update_task_status(&task.id, &emp, "Completed", Some("2026-10-02T00:00:00Z"))
            .expect("update"));
        let task = db.get_task(&task.id).expect("get").expect("exists");
        assert_eq!(task.status, "Completed");
        assert_eq!(task.completion_date.as_deref(), Some("2026-10-02T00:00:00Z"));
        assert_eq!(db.get_tasks_for_assignee(&emp, Some("Pending")).expect("list").len(), 0);
        assert_eq!(db.get_tasks_assigned_by(&boss).expect("list").len(), 1);
    }
}
