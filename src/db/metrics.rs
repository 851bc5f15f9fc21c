use super::*;

const SNAPSHOT_COLUMNS: &str = "id, employee_id, period_start, period_end, total_tasks,
     completed_tasks, task_completion_rate, average_task_speed, milestones_achieved,
     total_achievements, engagement_score, created_at, updated_at";
const REPORT_COLUMNS: &str = "id, leader_id, format, location, generated_at, status";

/// Aggregate values written into a snapshot row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotValues {
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub task_completion_rate: f64,
    pub average_task_speed: f64,
    pub milestones_achieved: i64,
    pub total_achievements: i64,
    pub engagement_score: f64,
}

impl PulseDb {
    // =========================================================================
    // Metrics snapshots
    // =========================================================================

    /// Update the snapshot for (employee, period_start) or insert it.
    pub fn upsert_snapshot(
        &self,
        employee_id: &str,
        period_start: &str,
        period_end: &str,
        values: &SnapshotValues,
    ) -> Result<DbMetricsSnapshot, DbError> {
        let now = crate::util::now_ts();
        self.conn.execute(
            "INSERT INTO metrics_snapshots (id, employee_id, period_start, period_end,
                 total_tasks, completed_tasks, task_completion_rate, average_task_speed,
                 milestones_achieved, total_achievements, engagement_score,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
             ON CONFLICT(employee_id, period_start) DO UPDATE SET
                period_end = excluded.period_end,
                total_tasks = excluded.total_tasks,
                completed_tasks = excluded.completed_tasks,
                task_completion_rate = excluded.task_completion_rate,
                average_task_speed = excluded.average_task_speed,
                milestones_achieved = excluded.milestones_achieved,
                total_achievements = excluded.total_achievements,
                engagement_score = excluded.engagement_score,
                updated_at = excluded.updated_at",
            params![
                new_id(),
                employee_id,
                period_start,
                period_end,
                values.total_tasks,
                values.completed_tasks,
                values.task_completion_rate,
                values.average_task_speed,
                values.milestones_achieved,
                values.total_achievements,
                values.engagement_score,
                now,
            ],
        )?;
        let sql = format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM metrics_snapshots
             WHERE employee_id = ?1 AND period_start = ?2"
        );
        Ok(self.conn.query_row(
            &sql,
            params![employee_id, period_start],
            Self::map_snapshot_row,
        )?)
    }

    /// Most recent snapshot (by period) for each of the given employees.
    /// Employees without any snapshot are absent from the result.
    pub fn get_latest_snapshots(
        &self,
        employee_ids: &[String],
    ) -> Result<Vec<DbMetricsSnapshot>, DbError> {
        let sql = format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM metrics_snapshots
             WHERE employee_id = ?1
             ORDER BY period_start DESC LIMIT 1"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut snapshots = Vec::new();
        for employee_id in employee_ids {
            let mut rows = stmt.query_map(params![employee_id], Self::map_snapshot_row)?;
            if let Some(row) = rows.next() {
                snapshots.push(row?);
            }
        }
        Ok(snapshots)
    }

    fn map_snapshot_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbMetricsSnapshot> {
        Ok(DbMetricsSnapshot {
            id: row.get(0)?,
            employee_id: row.get(1)?,
            period_start: row.get(2)?,
            period_end: row.get(3)?,
            total_tasks: row.get(4)?,
            completed_tasks: row.get(5)?,
            task_completion_rate: row.get(6)?,
            average_task_speed: row.get(7)?,
            milestones_achieved: row.get(8)?,
            total_achievements: row.get(9)?,
            engagement_score: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    // =========================================================================
    // Reports and report blobs
    // =========================================================================

    pub fn insert_report_blob(
        &self,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<String, DbError> {
        let id = new_id();
        self.conn.execute(
            "INSERT INTO report_blobs (id, filename, content_type, data, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, filename, content_type, data, crate::util::now_ts()],
        )?;
        Ok(id)
    }

    pub fn get_report_blob(&self, id: &str) -> Result<Option<DbReportBlob>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, filename, content_type, data, created_at FROM report_blobs WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], |row| {
            Ok(DbReportBlob {
                id: row.get(0)?,
                filename: row.get(1)?,
                content_type: row.get(2)?,
                data: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn insert_report(
        &self,
        leader_id: &str,
        format: &str,
        location: &str,
        generated_at: &str,
        status: &str,
    ) -> Result<DbReport, DbError> {
        let report = DbReport {
            id: new_id(),
            leader_id: leader_id.to_string(),
            format: format.to_string(),
            location: location.to_string(),
            generated_at: generated_at.to_string(),
            status: status.to_string(),
        };
        self.conn.execute(
            "INSERT INTO reports (id, leader_id, format, location, generated_at, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                report.id,
                report.leader_id,
                report.format,
                report.location,
                report.generated_at,
                report.status,
            ],
        )?;
        Ok(report)
    }

    pub fn get_report(&self, id: &str) -> Result<Option<DbReport>, DbError> {
        let sql = format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = ?1");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![id], Self::map_report_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn get_reports_for_leader(&self, leader_id: &str) -> Result<Vec<DbReport>, DbError> {
        let sql = format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE leader_id = ?1 ORDER BY generated_at DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![leader_id], Self::map_report_row)?;
        let mut reports = Vec::new();
        for row in rows {
            reports.push(row?);
        }
        Ok(reports)
    }

    fn map_report_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbReport> {
        Ok(DbReport {
            id: row.get(0)?,
            leader_id: row.get(1)?,
            format: row.get(2)?,
            location: row.get(3)?,
            generated_at: row.get(4)?,
            status: row.get(5)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use super::*;

    fn values(total: i64, completed: i64) -> SnapshotValues {
        SnapshotValues {
            total_tasks: total,
            completed_tasks: completed,
            task_completion_rate: 0.0,
            average_task_speed: 0.0,
            milestones_achieved: 0,
            total_achievements: 0,
            engagement_score: 0.0,
        }
    }

    #[test]
    fn test_snapshot_upsert_per_period() {
        let db = test_db();
        let emp = seed_employee(&db, "Ana", None, None, None);
        let first = db
            .upsert_snapshot(&emp, "2026-10-01T00:00:00Z", "2026-10-18T00:00:00Z", &values(2, 1))
            .expect("insert");
        let second = db
            .upsert_snapshot(&emp, "2026-10-01T00:00:00Z", "2026-10-19T00:00:00Z", &values(3, 2))
            .expect("update");
        assert_eq!(first.id, second.id);
        assert_eq!(second.total_tasks, 3);
        assert_eq!(second.period_end, "2026-10-19T00:00:00Z");

        db.upsert_snapshot(&emp, "2026-11-01T00:00:00Z", "2026-11-02T00:00:00Z", &values(1, 0))
            .expect("next month");
        let latest = db.get_latest_snapshots(&[emp.clone()]).expect("latest");
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].period_start, "2026-11-01T00:00:00Z");
    }

    #[test]
    fn test_report_blob_round_trip() {
        let db = test_db();
        let leader = seed_employee(&db, "Lead", None, None, None);
        let blob_id = db
            .insert_report_blob("r.pdf", "application/pdf", b"%PDF-1.4")
            .expect("blob");
        let report = db
            .insert_report(&leader, "pdf", &blob_id, "2026-10-18T00:00:00Z", "Generated")
            .expect("report");
        assert_eq!(db.get_reports_for_leader(&leader).expect("list").len(), 1);
        let stored = db.get_report(&report.id).expect("get").expect("exists");
        let blob = db.get_report_blob(&stored.location).expect("blob").expect("exists");
        assert_eq!(blob.data, b"%PDF-1.4");
    }
}
