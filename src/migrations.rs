//! Numbered schema migrations, embedded with `include_str!` and recorded in
//! `schema_version`. Each one runs once, inside its own transaction.

use rusqlite::backup::Progress;
use rusqlite::{Connection, DatabaseName};

use crate::db::DbError;

const MIGRATIONS: &[(i32, &str)] = &[(1, include_str!("migrations/001_baseline.sql"))];

fn latest_known() -> i32 {
    MIGRATIONS.last().map(|(version, _)| *version).unwrap_or(0)
}

fn schema_version(conn: &Connection) -> Result<i32, DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?)
}

/// Hot copy to `<db>.pre-migration.bak` before touching an existing file.
/// Fresh and in-memory databases have nothing worth keeping.
fn backup(conn: &Connection, from_version: i32) -> Result<(), DbError> {
    if from_version == 0 {
        return Ok(());
    }
    let Some(db_path) = conn.path().filter(|p| !p.is_empty()) else {
        return Ok(());
    };
    let target = format!("{}.pre-migration.bak", db_path);
    conn.backup(DatabaseName::Main, &target, None::<fn(Progress)>)
        .map_err(|e| DbError::Migration(format!("pre-migration backup failed: {}", e)))?;
    log::info!("Backed up v{} database to {}", from_version, target);
    Ok(())
}

/// Bring the schema up to date; returns how many migrations were applied.
/// A database written by a newer server is refused rather than downgraded.
pub fn run_migrations(conn: &Connection) -> Result<usize, DbError> {
    let current = schema_version(conn)?;
    if current > latest_known() {
        return Err(DbError::Migration(format!(
            "database schema v{} is newer than this server supports (v{}); upgrade the server first",
            current,
            latest_known()
        )));
    }

    let pending: Vec<_> = MIGRATIONS.iter().filter(|(v, _)| *v > current).collect();
    if pending.is_empty() {
        return Ok(0);
    }
    backup(conn, current)?;

    for (version, sql) in &pending {
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)
            .map_err(|e| DbError::Migration(format!("v{} failed: {}", version, e)))?;
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
        tx.commit()?;
        log::info!("Applied migration v{}", version);
    }
    Ok(pending.len())
}
