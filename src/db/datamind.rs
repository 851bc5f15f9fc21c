use super::*;

impl PulseDb {
    // =========================================================================
    // Datamind cards
    // =========================================================================

    /// Resolve a datamind type by name, creating it when absent.
    pub fn get_or_create_datamind_type(&self, name: &str) -> Result<DbDatamindType, DbError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO datamind_types (id, name) VALUES (?1, ?2)",
            params![new_id(), name],
        )?;
        Ok(self.conn.query_row(
            "SELECT id, name FROM datamind_types WHERE name = ?1",
            params![name],
            |row| {
                Ok(DbDatamindType {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )?)
    }

    pub fn get_datamind_types(&self) -> Result<Vec<DbDatamindType>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM datamind_types ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(DbDatamindType {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        let mut types = Vec::new();
        for row in rows {
            types.push(row?);
        }
        Ok(types)
    }

    pub fn insert_datamind(
        &self,
        type_id: &str,
        title: &str,
        content: &str,
    ) -> Result<String, DbError> {
        let id = new_id();
        self.conn.execute(
            "INSERT INTO datamind (id, type_id, title, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, type_id, title, content, crate::util::now_ts()],
        )?;
        Ok(id)
    }

    /// Datamind cards, optionally restricted to one type name (case-insensitive).
    pub fn get_datamind(&self, type_name: Option<&str>) -> Result<Vec<DbDatamind>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT d.id, d.type_id, t.name, d.title, d.content, d.created_at
             FROM datamind d
             JOIN datamind_types t ON t.id = d.type_id
             WHERE ?1 IS NULL OR lower(t.name) = lower(?1)
             ORDER BY t.name, d.title",
        )?;
        let rows = stmt.query_map(params![type_name], |row| {
            Ok(DbDatamind {
                id: row.get(0)?,
                type_id: row.get(1)?,
                type_name: row.get(2)?,
                title: row.get(3)?,
                content: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;
        let mut cards = Vec::new();
        for row in rows {
            cards.push(row?);
        }
        Ok(cards)
    }
}
