use super::*;

const EMPLOYEE_COLUMNS: &str = "id, name, email, password_hash, department_id, location,
     people_leader_id, is_admin, is_people_leader, job_title, hire_date, created_at";

/// Fields for a new employee record.
#[derive(Debug, Clone)]
pub struct NewEmployee<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: String,
    pub department_id: Option<&'a str>,
    pub location: Option<&'a str>,
    pub people_leader_id: Option<&'a str>,
    pub is_admin: bool,
    pub is_people_leader: bool,
    pub job_title: Option<&'a str>,
    pub hire_date: Option<&'a str>,
}

impl PulseDb {
    // =========================================================================
    // Employees
    // =========================================================================

    pub fn insert_employee(&self, employee: &NewEmployee<'_>) -> Result<DbEmployee, DbError> {
        let id = new_id();
        let now = crate::util::now_ts();
        self.conn.execute(
            "INSERT INTO employees (id, name, email, password_hash, department_id, location,
                                    people_leader_id, is_admin, is_people_leader, job_title,
                                    hire_date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                id,
                employee.name,
                employee.email.to_lowercase(),
                employee.password_hash,
                employee.department_id,
                employee.location,
                employee.people_leader_id,
                employee.is_admin,
                employee.is_people_leader,
                employee.job_title,
                employee.hire_date,
                now,
            ],
        )?;
        self.get_employee(&id)?
            .ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    pub fn get_employee(&self, id: &str) -> Result<Option<DbEmployee>, DbError> {
        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?1");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![id], Self::map_employee_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn get_employee_by_email(&self, email: &str) -> Result<Option<DbEmployee>, DbError> {
        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE email = ?1");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![email.trim().to_lowercase()], Self::map_employee_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn get_all_employees(&self) -> Result<Vec<DbEmployee>, DbError> {
        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees ORDER BY name");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::map_employee_row)?;
        let mut employees = Vec::new();
        for row in rows {
            employees.push(row?);
        }
        Ok(employees)
    }

    /// Employees whose `people_leader_id` is `leader_id`.
    pub fn get_direct_reports(&self, leader_id: &str) -> Result<Vec<DbEmployee>, DbError> {
        let sql = format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE people_leader_id = ?1 ORDER BY name"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![leader_id], Self::map_employee_row)?;
        let mut employees = Vec::new();
        for row in rows {
            employees.push(row?);
        }
        Ok(employees)
    }

    /// Employees who have at least one direct report.
    pub fn get_people_leaders(&self) -> Result<Vec<DbEmployee>, DbError> {
        let sql = format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees e
             WHERE EXISTS (SELECT 1 FROM employees r WHERE r.people_leader_id = e.id)
             ORDER BY name"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::map_employee_row)?;
        let mut employees = Vec::new();
        for row in rows {
            employees.push(row?);
        }
        Ok(employees)
    }

    /// Update the self-service profile fields. `None` leaves a field as is.
    pub fn update_employee_profile(
        &self,
        id: &str,
        location: Option<&str>,
        job_title: Option<&str>,
    ) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "UPDATE employees
             SET location = COALESCE(?2, location),
                 job_title = COALESCE(?3, job_title)
             WHERE id = ?1",
            params![id, location, job_title],
        )?;
        Ok(changed > 0)
    }

    /// Distinct non-empty locations across all employees.
    pub fn get_all_locations(&self) -> Result<Vec<String>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT location FROM employees
             WHERE location IS NOT NULL AND trim(location) != ''
             ORDER BY location",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut locations = Vec::new();
        for row in rows {
            locations.push(row?);
        }
        Ok(locations)
    }

    pub(crate) fn map_employee_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbEmployee> {
        Ok(DbEmployee {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            department_id: row.get(4)?,
            location: row.get(5)?,
            people_leader_id: row.get(6)?,
            is_admin: row.get(7)?,
            is_people_leader: row.get(8)?,
            job_title: row.get(9)?,
            hire_date: row.get(10)?,
            created_at: row.get(11)?,
        })
    }

    // =========================================================================
    // Departments
    // =========================================================================

    pub fn insert_department(&self, name: &str) -> Result<DbDepartment, DbError> {
        let id = new_id();
        self.conn.execute(
            "INSERT INTO departments (id, name) VALUES (?1, ?2)",
            params![id, name],
        )?;
        Ok(DbDepartment {
            id,
            name: name.to_string(),
        })
    }

    pub fn get_department(&self, id: &str) -> Result<Option<DbDepartment>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM departments WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], |row| {
            Ok(DbDepartment {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn get_all_departments(&self) -> Result<Vec<DbDepartment>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM departments ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(DbDepartment {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        let mut departments = Vec::new();
        for row in rows {
            departments.push(row?);
        }
        Ok(departments)
    }

    // =========================================================================
    // Teams and memberships
    // =========================================================================

    pub fn insert_team(&self, name: &str, department_id: Option<&str>) -> Result<DbTeam, DbError> {
        let id = new_id();
        self.conn.execute(
            "INSERT INTO teams (id, name, department_id) VALUES (?1, ?2, ?3)",
            params![id, name, department_id],
        )?;
        Ok(DbTeam {
            id,
            name: name.to_string(),
            department_id: department_id.map(str::to_string),
        })
    }

    pub fn get_team(&self, id: &str) -> Result<Option<DbTeam>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, department_id FROM teams WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], Self::map_team_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn get_all_teams(&self) -> Result<Vec<DbTeam>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, department_id FROM teams ORDER BY name")?;
        let rows = stmt.query_map([], Self::map_team_row)?;
        let mut teams = Vec::new();
        for row in rows {
            teams.push(row?);
        }
        Ok(teams)
    }

    /// Teams the employee belongs to, via `team_employees`.
    pub fn get_employee_teams(&self, employee_id: &str) -> Result<Vec<DbTeam>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.name, t.department_id
             FROM teams t
             JOIN team_employees te ON te.team_id = t.id
             WHERE te.employee_id = ?1
             ORDER BY t.name",
        )?;
        let rows = stmt.query_map(params![employee_id], Self::map_team_row)?;
        let mut teams = Vec::new();
        for row in rows {
            teams.push(row?);
        }
        Ok(teams)
    }

    pub fn get_team_members(&self, team_id: &str) -> Result<Vec<DbEmployee>, DbError> {
        let sql = format!(
            "SELECT {} FROM employees e
             JOIN team_employees te ON te.employee_id = e.id
             WHERE te.team_id = ?1
             ORDER BY e.name",
            EMPLOYEE_COLUMNS
                .split(',')
                .map(|c| format!("e.{}", c.trim()))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![team_id], Self::map_employee_row)?;
        let mut employees = Vec::new();
        for row in rows {
            employees.push(row?);
        }
        Ok(employees)
    }

    /// Add a membership. Returns false when it already existed.
    pub fn add_team_member(&self, team_id: &str, employee_id: &str) -> Result<bool, DbError> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO team_employees (team_id, employee_id) VALUES (?1, ?2)",
            params![team_id, employee_id],
        )?;
        Ok(inserted > 0)
    }

    pub fn remove_team_member(&self, team_id: &str, employee_id: &str) -> Result<bool, DbError> {
        let removed = self.conn.execute(
            "DELETE FROM team_employees WHERE team_id = ?1 AND employee_id = ?2",
            params![team_id, employee_id],
        )?;
        Ok(removed > 0)
    }

    fn map_team_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbTeam> {
        Ok(DbTeam {
            id: row.get(0)?,
            name: row.get(1)?,
            department_id: row.get(2)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use super::*;

    #[test]
    fn test_direct_reports_and_leaders() {
        let db = test_db();
        let lead = seed_employee(&db, "Lead", None, None, None);
        let a = seed_employee(&db, "Ana", None, None, Some(&lead));
        seed_employee(&db, "Solo", None, None, None);

        let reports = db.get_direct_reports(&lead).expect("reports");
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].id, a);

        let leaders = db.get_people_leaders().expect("leaders");
        assert_eq!(leaders.len(), 1);
        assert_eq!(leaders[0].id, lead);
    }

    #[test]
    fn test_team_membership_is_idempotent() {
        let db = test_db();
        let team = seed_team(&db, "Platform");
        let emp = seed_employee(&db, "Ana", None, None, None);
        assert!(db.add_team_member(&team, &emp).expect("add"));
        assert!(!db.add_team_member(&team, &emp).expect("re-add"));
        assert_eq!(db.get_team_members(&team).expect("members").len(), 1);
        assert_eq!(db.get_employee_teams(&emp).expect("teams")[0].name, "Platform");
        assert!(db.remove_team_member(&team, &emp).expect("remove"));
        assert!(db.get_team_members(&team).expect("members").is_empty());
    }

    #[test]
    fn test_email_lookup_is_case_insensitive() {
        let db = test_db();
        let id = seed_employee(&db, "Ana Lima", None, None, None);
        let found = db
            .get_employee_by_email("ANA.LIMA@pulse.test")
            .expect("query")
            .expect("found");
        assert_eq!(found.id, id);
        assert!(found.matches_password("secret"));
        assert!(!found.matches_password("wrong"));
    }

    #[test]
    fn test_locations_are_distinct() {
        let db = test_db();
        seed_employee(&db, "A", None, Some("Lisbon"), None);
        seed_employee(&db, "B", None, Some("Lisbon"), None);
        seed_employee(&db, "C", None, Some("Austin"), None);
        seed_employee(&db, "D", None, None, None);
        assert_eq!(
            db.get_all_locations().expect("locations"),
            vec!["Austin".to_string(), "Lisbon".to_string()]
        );
    }
}
