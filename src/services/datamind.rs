// Datamind service: short knowledge cards grouped by a free-form type.

use serde::Deserialize;

use crate::db::{DbDatamind, PulseDb};
use crate::error::ApiError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateDatamindRequest {
    #[serde(rename = "type")]
    pub type_name: String,
    pub title: String,
    pub content: String,
}

pub fn list_datamind(db: &PulseDb, type_name: Option<&str>) -> Result<Vec<DbDatamind>, ApiError> {
    let type_name = type_name.map(str::trim).filter(|t| !t.is_empty());
    Ok(db.get_datamind(type_name)?)
}

/// Create a card, creating its type on first use.
pub fn create_datamind(db: &PulseDb, req: &CreateDatamindRequest) -> Result<DbDatamind, ApiError> {
    let type_name = req.type_name.trim();
    let title = req.title.trim();
    let content = req.content.trim();
    if type_name.is_empty() || title.is_empty() || content.is_empty() {
        return Err(ApiError::Validation("type, title and content are required".into()));
    }

    let id = db.with_transaction(|tx| -> Result<String, ApiError> {
        let datamind_type = tx.get_or_create_datamind_type(type_name)?;
        Ok(tx.insert_datamind(&datamind_type.id, title, content)?)
    })?;
    db.get_datamind(Some(type_name))?
        .into_iter()
        .find(|card| card.id == id)
        .ok_or_else(|| ApiError::Internal(format!("datamind card {} vanished after insert", id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;

    #[test]
    fn test_create_reuses_existing_type() {
        let db = test_db();
        let first = create_datamind(
            &db,
            &CreateDatamindRequest {
                type_name: "Tips".into(),
                title: "Breaks".into(),
                content: "Take them".into(),
            },
        )
        .expect("create");
        assert_eq!(first.type_name, "Tips");

        create_datamind(
            &db,
            &CreateDatamindRequest {
                type_name: "Tips".into(),
                title: "Water".into(),
                content: "Drink it".into(),
            },
        )
        .expect("create");
        assert_eq!(db.get_datamind_types().expect("types").len(), 1);
        assert_eq!(list_datamind(&db, Some("tips")).expect("list").len(), 2);
        assert_eq!(list_datamind(&db, Some(" ")).expect("all").len(), 2);

        assert!(matches!(
            create_datamind(&db, &CreateDatamindRequest::default()),
            Err(ApiError::Validation(_))
        ));
    }
}
