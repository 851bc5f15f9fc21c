//! SQLite-backed store for every collection the server owns.
//!
//! One table per collection plus one table per join collection; uniqueness
//! on natural composite keys is enforced by the schema. Query methods are
//! grouped by collection in the submodules, all as `impl PulseDb` blocks.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};

pub mod types;
pub use types::*;

pub mod datamind;
pub mod employees;
pub mod events;
pub mod metrics;
pub mod notifications;
pub mod posts;
pub mod recognition;
pub mod targeting;
pub mod tasks;

pub struct PulseDb {
    conn: Connection,
}

impl PulseDb {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err.
    pub fn with_transaction<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<DbError>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(DbError::from)?;
        match f(self) {
            Ok(val) => {
                self.conn.execute_batch("COMMIT").map_err(DbError::from)?;
                Ok(val)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Open (or create) the database at `path` and apply the schema.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;

        // WAL keeps readers from blocking the writer during long exports.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        crate::migrations::run_migrations(&conn)?;

        // `rarray(?)` lets id lists bind as a single parameter.
        rusqlite::vtab::array::load_module(&conn)?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        log::info!("Opened database at {}", path.display());
        Ok(Self { conn })
    }

    /// Open the configured database, defaulting to `~/.pulse/pulse.db`.
    pub fn open(path: Option<&Path>) -> Result<Self, DbError> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| crate::types::pulse_home().join("pulse.db"));
        Self::open_at(path)
    }

    /// Count rows of a table matching a single-column equality. Table and
    /// column names come from compile-time constants only.
    pub(crate) fn exists_by(&self, table: &str, column: &str, value: &str) -> Result<bool, DbError> {
        let sql = format!("SELECT 1 FROM {table} WHERE {column} = ?1 LIMIT 1");
        let mut stmt = self.conn.prepare(&sql)?;
        Ok(stmt.exists(params![value])?)
    }
}

/// Fresh UUID v4 for a new row.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// =============================================================================
// Shared test utilities
// =============================================================================

#[cfg(test)]
pub mod test_utils {
    use super::{new_id, PulseDb};
    use rusqlite::params;

    /// Create a temporary database for testing.
    ///
    /// We leak the `TempDir` so the directory persists for the duration of the test.
    pub fn test_db() -> PulseDb {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("test.db");
        std::mem::forget(dir);
        PulseDb::open_at(path).expect("Failed to open test database")
    }

    pub fn seed_department(db: &PulseDb, name: &str) -> String {
        let id = new_id();
        db.conn_ref()
            .execute(
                "INSERT INTO departments (id, name) VALUES (?1, ?2)",
                params![id, name],
            )
            .expect("insert department");
        id
    }

    pub fn seed_team(db: &PulseDb, name: &str) -> String {
        let id = new_id();
        db.conn_ref()
            .execute(
                "INSERT INTO teams (id, name) VALUES (?1, ?2)",
                params![id, name],
            )
            .expect("insert team");
        id
    }

    /// Insert an employee with password `secret` and return its id.
    pub fn seed_employee(
        db: &PulseDb,
        name: &str,
        department_id: Option<&str>,
        location: Option<&str>,
        leader_id: Option<&str>,
    ) -> String {
        let id = new_id();
        let email = format!("{}@pulse.test", name.to_lowercase().replace(' ', "."));
        db.conn_ref()
            .execute(
                "INSERT INTO employees (id, name, email, password_hash, department_id, location,
                                        people_leader_id, is_admin, is_people_leader, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, 0, '2020-01-01T00:00:00Z')",
                params![
                    id,
                    name,
                    email,
                    crate::auth::hash_password("secret"),
                    department_id,
                    location,
                    leader_id
                ],
            )
            .expect("insert employee");
        id
    }

    pub fn add_to_team(db: &PulseDb, team_id: &str, employee_id: &str) {
        db.conn_ref()
            .execute(
                "INSERT INTO team_employees (team_id, employee_id) VALUES (?1, ?2)",
                params![team_id, employee_id],
            )
            .expect("insert membership");
    }
}

#[cfg(test)]
mod tests {
    use super::test_utils::*;
    use super::*;

    #[test]
    fn test_open_creates_tables() {
        let db = test_db();
        let count: i64 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM employees", [], |row| row.get(0))
            .expect("employees table");
        assert_eq!(count, 0);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let db = test_db();
        let result: Result<(), DbError> = db.with_transaction(|tx| {
            tx.conn_ref().execute(
                "INSERT INTO departments (id, name) VALUES ('d1', 'Sales')",
                [],
            )?;
            Err(DbError::Migration("forced".to_string()))
        });
        assert!(result.is_err());
        assert!(!db.exists_by("departments", "id", "d1").expect("query"));
    }

    #[test]
    fn test_unique_violation_detected() {
        let db = test_db();
        seed_department(&db, "Sales");
        let err = db
            .conn_ref()
            .execute(
                "INSERT INTO departments (id, name) VALUES ('x', 'Sales')",
                [],
            )
            .map_err(DbError::from)
            .expect_err("duplicate name");
        assert!(err.is_unique_violation());
    }
}
