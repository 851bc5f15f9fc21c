use super::targeting::id_array;
use super::*;

const POST_SELECT: &str = "SELECT p.id, p.author_id, p.title, p.content, p.visibility, p.is_global,
            p.created_at, p.updated_at, e.name
     FROM posts p
     LEFT JOIN employees e ON e.id = p.author_id";

impl PulseDb {
    // =========================================================================
    // Posts
    // =========================================================================

    pub fn insert_post(
        &self,
        author_id: &str,
        title: &str,
        content: &str,
        is_global: bool,
    ) -> Result<DbPost, DbError> {
        let id = new_id();
        let now = crate::util::now_ts();
        self.conn.execute(
            "INSERT INTO posts (id, author_id, title, content, visibility, is_global, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?6)",
            params![id, author_id, title, content, is_global, now],
        )?;
        self.get_post(&id)?
            .ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    pub fn get_post(&self, id: &str) -> Result<Option<DbPost>, DbError> {
        let sql = format!("{POST_SELECT} WHERE p.id = ?1");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![id], Self::map_post_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Visible posts among `ids`, newest first.
    pub fn get_visible_posts_by_ids(&self, ids: &[String]) -> Result<Vec<DbPost>, DbError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "{POST_SELECT} WHERE p.id IN rarray(?1) AND p.visibility = 1 ORDER BY p.created_at DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![id_array(ids)], Self::map_post_row)?;
        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }

    pub fn get_posts_by_author(&self, author_id: &str) -> Result<Vec<DbPost>, DbError> {
        let sql = format!("{POST_SELECT} WHERE p.author_id = ?1 ORDER BY p.created_at DESC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![author_id], Self::map_post_row)?;
        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }

    /// Set visibility on a post owned by `author_id`. Returns false when no
    /// such post exists for that author.
    pub fn set_post_visibility(
        &self,
        id: &str,
        author_id: &str,
        visibility: bool,
    ) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "UPDATE posts SET visibility = ?3, updated_at = ?4 WHERE id = ?1 AND author_id = ?2",
            params![id, author_id, visibility, crate::util::now_ts()],
        )?;
        Ok(changed > 0)
    }

    /// Delete a post owned by `author_id`; join rows cascade.
    pub fn delete_post(&self, id: &str, author_id: &str) -> Result<bool, DbError> {
        let removed = self.conn.execute(
            "DELETE FROM posts WHERE id = ?1 AND author_id = ?2",
            params![id, author_id],
        )?;
        Ok(removed > 0)
    }

    fn map_post_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbPost> {
        Ok(DbPost {
            id: row.get(0)?,
            author_id: row.get(1)?,
            title: row.get(2)?,
            content: row.get(3)?,
            visibility: row.get(4)?,
            is_global: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
            author_name: row.get(8)?,
        })
    }
}
