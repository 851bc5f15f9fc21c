use super::*;

const BADGE_COLUMNS: &str = "id, name, description, icon, criteria, created_at";
const ACHIEVEMENT_COLUMNS: &str =
    "id, employee_id, task_id, badge_id, related_entity_id, title, visibility, achieved_at";
const MILESTONE_COLUMNS: &str = "id, employee_id, tenure_years, title, visibility, achieved_at";

/// Fields for a badge record.
#[derive(Debug, Clone, Default)]
pub struct BadgeFields {
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub criteria: Option<String>,
}

impl PulseDb {
    // =========================================================================
    // Badges
    // =========================================================================

    pub fn insert_badge(&self, badge: &BadgeFields) -> Result<DbBadge, DbError> {
        let id = new_id();
        self.conn.execute(
            "INSERT INTO badges (id, name, description, icon, criteria, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                badge.name,
                badge.description,
                badge.icon,
                badge.criteria,
                crate::util::now_ts()
            ],
        )?;
        self.get_badge(&id)?
            .ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Insert or refresh a badge by its unique name. Returns true when a new
    /// badge was created.
    pub fn upsert_badge_by_name(&self, badge: &BadgeFields) -> Result<bool, DbError> {
        let existed = self.exists_by("badges", "name", &badge.name)?;
        self.conn.execute(
            "INSERT INTO badges (id, name, description, icon, criteria, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(name) DO UPDATE SET
                description = COALESCE(excluded.description, badges.description),
                icon = COALESCE(excluded.icon, badges.icon),
                criteria = COALESCE(excluded.criteria, badges.criteria)",
            params![
                new_id(),
                badge.name,
                badge.description,
                badge.icon,
                badge.criteria,
                crate::util::now_ts()
            ],
        )?;
        Ok(!existed)
    }

    pub fn get_badge(&self, id: &str) -> Result<Option<DbBadge>, DbError> {
        let sql = format!("SELECT {BADGE_COLUMNS} FROM badges WHERE id = ?1");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![id], Self::map_badge_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn get_all_badges(&self) -> Result<Vec<DbBadge>, DbError> {
        let sql = format!("SELECT {BADGE_COLUMNS} FROM badges ORDER BY name");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::map_badge_row)?;
        let mut badges = Vec::new();
        for row in rows {
            badges.push(row?);
        }
        Ok(badges)
    }

    fn map_badge_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbBadge> {
        Ok(DbBadge {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            icon: row.get(3)?,
            criteria: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    // =========================================================================
    // Achievements
    // =========================================================================

    /// Record a task achievement once per (employee, task). Returns `None`
    /// when it already existed.
    pub fn insert_task_achievement(
        &self,
        employee_id: &str,
        task_id: &str,
        title: &str,
    ) -> Result<Option<DbAchievement>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT 1 FROM achievements WHERE employee_id = ?1 AND task_id = ?2 LIMIT 1",
        )?;
        if stmt.exists(params![employee_id, task_id])? {
            return Ok(None);
        }
        self.insert_achievement(employee_id, Some(task_id), None, None, title)
            .map(Some)
    }

    /// Record a badge achievement, unique per (employee, badge, related entity).
    pub fn insert_badge_achievement(
        &self,
        employee_id: &str,
        badge_id: &str,
        related_entity_id: Option<&str>,
        title: &str,
    ) -> Result<DbAchievement, DbError> {
        self.insert_achievement(employee_id, None, Some(badge_id), related_entity_id, title)
    }

    fn insert_achievement(
        &self,
        employee_id: &str,
        task_id: Option<&str>,
        badge_id: Option<&str>,
        related_entity_id: Option<&str>,
        title: &str,
    ) -> Result<DbAchievement, DbError> {
        let achievement = DbAchievement {
            id: new_id(),
            employee_id: employee_id.to_string(),
            task_id: task_id.map(str::to_string),
            badge_id: badge_id.map(str::to_string),
            related_entity_id: related_entity_id.map(str::to_string),
            title: title.to_string(),
            visibility: true,
            achieved_at: crate::util::now_ts(),
        };
        self.conn.execute(
            "INSERT INTO achievements (id, employee_id, task_id, badge_id, related_entity_id,
                                       title, visibility, achieved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
            params![
                achievement.id,
                achievement.employee_id,
                achievement.task_id,
                achievement.badge_id,
                achievement.related_entity_id,
                achievement.title,
                achievement.achieved_at,
            ],
        )?;
        Ok(achievement)
    }

    pub fn get_achievements_for(&self, employee_id: &str) -> Result<Vec<DbAchievement>, DbError> {
        let sql = format!(
            "SELECT {ACHIEVEMENT_COLUMNS} FROM achievements
             WHERE employee_id = ?1 ORDER BY achieved_at DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![employee_id], |row| {
            Ok(DbAchievement {
                id: row.get(0)?,
                employee_id: row.get(1)?,
                task_id: row.get(2)?,
                badge_id: row.get(3)?,
                related_entity_id: row.get(4)?,
                title: row.get(5)?,
                visibility: row.get(6)?,
                achieved_at: row.get(7)?,
            })
        })?;
        let mut achievements = Vec::new();
        for row in rows {
            achievements.push(row?);
        }
        Ok(achievements)
    }

    /// Returns false when the achievement does not belong to `employee_id`.
    pub fn set_achievement_visibility(
        &self,
        id: &str,
        employee_id: &str,
        visibility: bool,
    ) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "UPDATE achievements SET visibility = ?3 WHERE id = ?1 AND employee_id = ?2",
            params![id, employee_id, visibility],
        )?;
        Ok(changed > 0)
    }

    pub fn count_achievements(&self, employee_id: &str) -> Result<i64, DbError> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM achievements WHERE employee_id = ?1",
            params![employee_id],
            |row| row.get(0),
        )?)
    }

    // =========================================================================
    // Milestones
    // =========================================================================

    pub fn milestone_exists(&self, employee_id: &str, tenure_years: i64) -> Result<bool, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT 1 FROM milestones WHERE employee_id = ?1 AND tenure_years = ?2 LIMIT 1",
        )?;
        Ok(stmt.exists(params![employee_id, tenure_years])?)
    }

    pub fn insert_milestone(
        &self,
        employee_id: &str,
        tenure_years: i64,
        title: &str,
        achieved_at: &str,
    ) -> Result<DbMilestone, DbError> {
        let milestone = DbMilestone {
            id: new_id(),
            employee_id: employee_id.to_string(),
            tenure_years,
            title: title.to_string(),
            visibility: true,
            achieved_at: achieved_at.to_string(),
        };
        self.conn.execute(
            "INSERT INTO milestones (id, employee_id, tenure_years, title, visibility, achieved_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5)",
            params![
                milestone.id,
                milestone.employee_id,
                milestone.tenure_years,
                milestone.title,
                milestone.achieved_at,
            ],
        )?;
        Ok(milestone)
    }

    pub fn get_milestones_for(&self, employee_id: &str) -> Result<Vec<DbMilestone>, DbError> {
        let sql = format!(
            "SELECT {MILESTONE_COLUMNS} FROM milestones
             WHERE employee_id = ?1 ORDER BY tenure_years"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![employee_id], |row| {
            Ok(DbMilestone {
                id: row.get(0)?,
                employee_id: row.get(1)?,
                tenure_years: row.get(2)?,
                title: row.get(3)?,
                visibility: row.get(4)?,
                achieved_at: row.get(5)?,
            })
        })?;
        let mut milestones = Vec::new();
        for row in rows {
            milestones.push(row?);
        }
        Ok(milestones)
    }

    /// Returns false when the milestone does not belong to `employee_id`.
    pub fn set_milestone_visibility(
        &self,
        id: &str,
        employee_id: &str,
        visibility: bool,
    ) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "UPDATE milestones SET visibility = ?3 WHERE id = ?1 AND employee_id = ?2",
            params![id, employee_id, visibility],
        )?;
        Ok(changed > 0)
    }

    pub fn count_milestones(&self, employee_id: &str) -> Result<i64, DbError> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM milestones WHERE employee_id = ?1",
            params![employee_id],
            |row| row.get(0),
        )?)
    }
}
