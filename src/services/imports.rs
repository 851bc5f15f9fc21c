// Spreadsheet imports: bulk-load datamind cards and badges from an uploaded
// workbook. The first sheet's header row names the columns.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::db::recognition::BadgeFields;
use crate::db::{DbError, PulseDb};
use crate::error::ApiError;
use crate::util::atomic_write_bytes;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Upload is empty")]
    EmptyUpload,

    #[error("Could not read workbook: {0}")]
    Workbook(String),

    #[error("Workbook has no header row")]
    EmptySheet,

    #[error("Missing required column: {0}")]
    MissingColumn(&'static str),

    #[error("Failed to save upload: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::EmptyUpload
            | ImportError::Workbook(_)
            | ImportError::EmptySheet
            | ImportError::MissingColumn(_) => ApiError::Validation(err.to_string()),
            ImportError::Io(e) => ApiError::Internal(e.to_string()),
            ImportError::Db(e) => ApiError::Db(e),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatamindRow {
    pub type_name: String,
    pub title: String,
    pub content: String,
}

/// Persist the raw upload under `upload_dir` so a failed import can be
/// inspected later.
pub fn save_upload(upload_dir: &Path, kind: &str, bytes: &[u8]) -> Result<PathBuf, ImportError> {
    if bytes.is_empty() {
        return Err(ImportError::EmptyUpload);
    }
    let path = upload_dir.join(format!("{}_{}.xlsx", kind, uuid::Uuid::new_v4()));
    atomic_write_bytes(&path, bytes)?;
    Ok(path)
}

/// All rows of the first worksheet as trimmed strings.
pub fn read_rows(path: &Path) -> Result<Vec<Vec<String>>, ImportError> {
    use calamine::{open_workbook_auto, Reader};

    let mut workbook =
        open_workbook_auto(path).map_err(|e| ImportError::Workbook(e.to_string()))?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(ImportError::EmptySheet)?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| ImportError::Workbook(e.to_string()))?;
    Ok(range
        .rows()
        .map(|row| row.iter().map(|c| cell_to_string(c).trim().to_string()).collect())
        .collect())
}

fn cell_to_string(cell: &calamine::Data) -> String {
    use calamine::Data;
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Int(n) => n.to_string(),
        Data::Float(f) => format!("{}", f),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => format!("{}", dt),
    }
}

/// Index of `name` in the header, case-insensitive.
fn column(header: &[String], name: &'static str) -> Option<usize> {
    header
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
}

fn required_column(header: &[String], name: &'static str) -> Result<usize, ImportError> {
    column(header, name).ok_or(ImportError::MissingColumn(name))
}

fn cell(row: &[String], idx: Option<usize>) -> Option<String> {
    idx.and_then(|i| row.get(i))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Map rows (header first) to datamind cards. Rows missing a required cell
/// are counted as skipped.
pub fn map_datamind_rows(rows: &[Vec<String>]) -> Result<(Vec<DatamindRow>, usize), ImportError> {
    let (header, body) = rows.split_first().ok_or(ImportError::EmptySheet)?;
    let type_col = required_column(header, "type")?;
    let title_col = required_column(header, "title")?;
    let content_col = required_column(header, "content")?;

    let mut cards = Vec::new();
    let mut skipped = 0;
    for row in body.iter().filter(|r| r.iter().any(|c| !c.trim().is_empty())) {
        match (
            cell(row, Some(type_col)),
            cell(row, Some(title_col)),
            cell(row, Some(content_col)),
        ) {
            (Some(type_name), Some(title), Some(content)) => cards.push(DatamindRow {
                type_name,
                title,
                content,
            }),
            _ => skipped += 1,
        }
    }
    Ok((cards, skipped))
}

/// Map rows (header first) to badge fields; only `name` is required.
pub fn map_badge_rows(rows: &[Vec<String>]) -> Result<(Vec<BadgeFields>, usize), ImportError> {
    let (header, body) = rows.split_first().ok_or(ImportError::EmptySheet)?;
    let name_col = required_column(header, "name")?;
    let description_col = column(header, "description");
    let icon_col = column(header, "icon");
    let criteria_col = column(header, "criteria");

    let mut badges = Vec::new();
    let mut skipped = 0;
    for row in body.iter().filter(|r| r.iter().any(|c| !c.trim().is_empty())) {
        match cell(row, Some(name_col)) {
            Some(name) => badges.push(BadgeFields {
                name,
                description: cell(row, description_col),
                icon: cell(row, icon_col),
                criteria: cell(row, criteria_col),
            }),
            None => skipped += 1,
        }
    }
    Ok((badges, skipped))
}

pub fn import_datamind_rows(db: &PulseDb, rows: &[Vec<String>]) -> Result<ImportSummary, ImportError> {
    let (cards, skipped) = map_datamind_rows(rows)?;
    let imported = db.with_transaction(|tx| -> Result<usize, ImportError> {
        for card in &cards {
            let datamind_type = tx.get_or_create_datamind_type(&card.type_name)?;
            tx.insert_datamind(&datamind_type.id, &card.title, &card.content)?;
        }
        Ok(cards.len())
    })?;
    log::info!("Imported {} datamind cards ({} skipped)", imported, skipped);
    Ok(ImportSummary { imported, skipped })
}

pub fn import_badge_rows(db: &PulseDb, rows: &[Vec<String>]) -> Result<ImportSummary, ImportError> {
    let (badges, skipped) = map_badge_rows(rows)?;
    let imported = db.with_transaction(|tx| -> Result<usize, ImportError> {
        for badge in &badges {
            tx.upsert_badge_by_name(badge)?;
        }
        Ok(badges.len())
    })?;
    log::info!("Imported {} badges ({} skipped)", imported, skipped);
    Ok(ImportSummary { imported, skipped })
}

pub fn import_datamind_workbook(db: &PulseDb, path: &Path) -> Result<ImportSummary, ImportError> {
    import_datamind_rows(db, &read_rows(path)?)
}

pub fn import_badge_workbook(db: &PulseDb, path: &Path) -> Result<ImportSummary, ImportError> {
    import_badge_rows(db, &read_rows(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;

    fn rows(raw: &[&[&str]]) -> Vec<Vec<String>> {
        raw.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_datamind_rows_skip_incomplete() {
        let db = test_db();
        let sheet = rows(&[
            &["Title", "TYPE", "Content"],
            &["Breaks", "Tips", "Take them"],
            &["Leave", "FAQ", ""],
            &["", "", ""],
            &["Parking", "faq", "Level -2"],
        ]);
        let summary = import_datamind_rows(&db, &sheet).expect("import");
        assert_eq!(summary, ImportSummary { imported: 2, skipped: 1 });
        assert_eq!(db.get_datamind(Some("tips")).expect("tips").len(), 1);
    }

    #[test]
    fn test_badge_rows_upsert_by_name() {
        let db = test_db();
        let sheet = rows(&[
            &["name", "description"],
            &["Mentor", "Helps others"],
            &["Mentor", "Helps a lot"],
            &["", "orphan"],
        ]);
        let summary = import_badge_rows(&db, &sheet).expect("import");
        assert_eq!(summary, ImportSummary { imported: 2, skipped: 1 });
        let badges = db.get_all_badges().expect("badges");
        assert_eq!(badges.len(), 1);
        assert_eq!(badges[0].description.as_deref(), Some("Helps a lot"));
    }

    #[test]
    fn test_missing_column_and_bad_workbook() {
        let sheet = rows(&[&["title", "content"], &["a", "b"]]);
        assert!(matches!(
            map_datamind_rows(&sheet),
            Err(ImportError::MissingColumn("type"))
        ));

        let dir = tempfile::tempdir().expect("temp dir");
        assert!(matches!(
            save_upload(dir.path(), "badges", b""),
            Err(ImportError::EmptyUpload)
        ));
        let path = save_upload(dir.path(), "badges", b"not a workbook").expect("saved");
        assert!(path.exists());
        assert!(matches!(read_rows(&path), Err(ImportError::Workbook(_))));
    }
}
