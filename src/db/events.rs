use std::collections::HashMap;

use super::targeting::id_array;
use super::*;

const EVENT_COLUMNS: &str = "id, creator_id, title, description, venue, start_date, end_date,
     archived, is_global, created_at";

/// Fields for a new event.
#[derive(Debug, Clone)]
pub struct NewEvent<'a> {
    pub creator_id: &'a str,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub venue: Option<&'a str>,
    pub start_date: String,
    pub end_date: Option<String>,
    pub is_global: bool,
}

impl PulseDb {
    // =========================================================================
    // Events
    // =========================================================================

    pub fn insert_event(&self, event: &NewEvent<'_>) -> Result<DbEvent, DbError> {
        let id = new_id();
        self.conn.execute(
            "INSERT INTO events (id, creator_id, title, description, venue, start_date, end_date,
                                 archived, is_global, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?9)",
            params![
                id,
                event.creator_id,
                event.title,
                event.description,
                event.venue,
                event.start_date,
                event.end_date,
                event.is_global,
                crate::util::now_ts(),
            ],
        )?;
        self.get_event(&id)?
            .ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    pub fn get_event(&self, id: &str) -> Result<Option<DbEvent>, DbError> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![id], Self::map_event_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Events among `ids` that are not archived or still upcoming at `now`,
    /// optionally filtered by a case-insensitive title substring. Ordered by
    /// start date. The title match runs here rather than in SQL because
    /// SQLite's `lower()` only folds ASCII.
    pub fn get_listed_events_by_ids(
        &self,
        ids: &[String],
        now: &str,
        search: Option<&str>,
    ) -> Result<Vec<DbEvent>, DbError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE id IN rarray(?1)
               AND (archived = 0 OR start_date > ?2)
             ORDER BY start_date ASC"
        );
        let term = search
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase);

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![id_array(ids), now], Self::map_event_row)?;
        let mut events = Vec::new();
        for row in rows {
            let event = row?;
            if let Some(ref term) = term {
                if !event.title.to_lowercase().contains(term.as_str()) {
                    continue;
                }
            }
            events.push(event);
        }
        Ok(events)
    }

    /// The employee's recorded responses for the given events, from the
    /// direct-targeting rows. Rows without a response map to `None`.
    pub fn get_direct_responses(
        &self,
        employee_id: &str,
        event_ids: &[String],
    ) -> Result<HashMap<String, Option<String>>, DbError> {
        if event_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut stmt = self.conn.prepare(
            "SELECT event_id, response FROM event_employees
             WHERE employee_id = ?1 AND event_id IN rarray(?2)",
        )?;
        let rows = stmt.query_map(params![employee_id, id_array(event_ids)], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
        })?;
        let mut responses = HashMap::new();
        for row in rows {
            let (event_id, response) = row?;
            responses.insert(event_id, response);
        }
        Ok(responses)
    }

    /// Record the employee's response, creating the direct row if needed.
    pub fn upsert_event_response(
        &self,
        event_id: &str,
        employee_id: &str,
        response: &str,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO event_employees (event_id, employee_id, response, responded_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(event_id, employee_id) DO UPDATE SET
                response = excluded.response,
                responded_at = excluded.responded_at",
            params![event_id, employee_id, response, crate::util::now_ts()],
        )?;
        Ok(())
    }

    pub fn get_event_attendees(&self, event_id: &str) -> Result<Vec<DbEventAttendee>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT ee.event_id, ee.employee_id, e.name, ee.response, ee.responded_at
             FROM event_employees ee
             JOIN employees e ON e.id = ee.employee_id
             WHERE ee.event_id = ?1
             ORDER BY e.name",
        )?;
        let rows = stmt.query_map(params![event_id], |row| {
            Ok(DbEventAttendee {
                event_id: row.get(0)?,
                employee_id: row.get(1)?,
                employee_name: row.get(2)?,
                response: row.get(3)?,
                responded_at: row.get(4)?,
            })
        })?;
        let mut attendees = Vec::new();
        for row in rows {
            attendees.push(row?);
        }
        Ok(attendees)
    }

    /// Archive an event owned by `creator_id`. Returns false when the creator
    /// does not own such an event.
    pub fn archive_event(&self, id: &str, creator_id: &str) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "UPDATE events SET archived = 1 WHERE id = ?1 AND creator_id = ?2",
            params![id, creator_id],
        )?;
        Ok(changed > 0)
    }

    /// Archive every event that has ended (end date, or start date when no
    /// end date is set) before `now`. Returns the number archived.
    pub fn archive_past_events(&self, now: &str) -> Result<usize, DbError> {
        let changed = self.conn.execute(
            "UPDATE events SET archived = 1
             WHERE archived = 0 AND COALESCE(end_date, start_date) < ?1",
            params![now],
        )?;
        Ok(changed)
    }

    fn map_event_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbEvent> {
        Ok(DbEvent {
            id: row.get(0)?,
            creator_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            venue: row.get(4)?,
            start_date: row.get(5)?,
            end_date: row.get(6)?,
            archived: row.get(7)?,
            is_global: row.get(8)?,
            created_at: row.get(9)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use super::*;

    fn new_event<'a>(creator: &'a str, title: &'a str, start: &str, end: Option<&str>) -> NewEvent<'a> {
        NewEvent {
            creator_id: creator,
            title,
            description: None,
            venue: None,
            start_date: start.to_string(),
            end_date: end.map(str::to_string),
            is_global: false,
        }
    }

    #[test]
    fn test_archive_past_events() {
        let db = test_db();
        let creator = seed_employee(&db, "Creator", None, None, None);
        let past = db
            .insert_event(&new_event(&creator, "Past", "2026-01-01T10:00:00Z", Some("2026-01-01T12:00:00Z")))
            .expect("event");
        let future = db
            .insert_event(&new_event(&creator, "Future", "2026-12-01T10:00:00Z", None))
            .expect("event");

        let archived = db.archive_past_events("2026-06-01T00:00:00Z").expect("archive");
        assert_eq!(archived, 1);
        assert!(db.get_event(&past.id).expect("get").expect("exists").archived);
        assert!(!db.get_event(&future.id).expect("get").expect("exists").archived);
    }

    #[test]
    fn test_listing_filters_archived_and_search() {
        let db = test_db();
        let creator = seed_employee(&db, "Creator", None, None, None);
        let old = db
            .insert_event(&new_event(&creator, "Old Party", "2026-01-01T10:00:00Z", None))
            .expect("event");
        let upcoming = db
            .insert_event(&new_event(&creator, "Summer PARTY", "2026-08-01T10:00:00Z", None))
            .expect("event");
        let other = db
            .insert_event(&new_event(&creator, "Town hall", "2026-08-02T10:00:00Z", None))
            .expect("event");
        db.archive_past_events("2026-06-01T00:00:00Z").expect("archive");

        let ids = vec![old.id.clone(), upcoming.id.clone(), other.id.clone()];
        let listed = db
            .get_listed_events_by_ids(&ids, "2026-06-01T00:00:00Z", None)
            .expect("list");
        assert_eq!(listed.len(), 2);

        let searched = db
            .get_listed_events_by_ids(&ids, "2026-06-01T00:00:00Z", Some("party"))
            .expect("search");
        assert_eq!(searched.len(), 1);
        assert_eq!(searched[0].id, upcoming.id);
    }

    #[test]
    fn test_search_folds_non_ascii_case() {
        let db = test_db();
        let creator = seed_employee(&db, "Creator", None, None, None);
        let summer = db
            .insert_event(&new_event(&creator, "ÉTÉ Party", "2026-08-01T10:00:00Z", None))
            .expect("event");
        let ids = vec![summer.id.clone()];

        let searched = db
            .get_listed_events_by_ids(&ids, "2026-06-01T00:00:00Z", Some("été"))
            .expect("search");
        assert_eq!(searched.len(), 1);
        assert_eq!(searched[0].id, summer.id);

        // `%` is an ordinary character, not a wildcard.
        let literal = db
            .get_listed_events_by_ids(&ids, "2026-06-01T00:00:00Z", Some("%"))
            .expect("search");
        assert!(literal.is_empty());
    }

    #[test]
    fn test_listing_accepts_more_ids_than_host_parameters() {
        let db = test_db();
        let creator = seed_employee(&db, "Creator", None, None, None);
        let event = db
            .insert_event(&new_event(&creator, "Launch", "2026-08-01T10:00:00Z", None))
            .expect("event");
        let mut ids: Vec<String> = (0..40_000).map(|i| format!("missing-{i}")).collect();
        ids.push(event.id.clone());

        let listed = db
            .get_listed_events_by_ids(&ids, "2026-06-01T00:00:00Z", None)
            .expect("list");
        assert_eq!(listed.len(), 1);
        assert!(db.get_direct_responses(&creator, &ids).expect("responses").is_empty());
    }

    #[test]
    fn test_response_upsert() {
        let db = test_db();
        let creator = seed_employee(&db, "Creator", None, None, None);
        let guest = seed_employee(&db, "Guest", None, None, None);
        let event = db
            .insert_event(&new_event(&creator, "Offsite", "2026-08-01T10:00:00Z", None))
            .expect("event");

        db.upsert_event_response(&event.id, &guest, "Accepted").expect("accept");
        db.upsert_event_response(&event.id, &guest, "Declined").expect("decline");

        let responses = db
            .get_direct_responses(&guest, std::slice::from_ref(&event.id))
            .expect("responses");
        assert_eq!(responses.get(&event.id), Some(&Some("Declined".to_string())));
        assert_eq!(db.get_event_attendees(&event.id).expect("attendees").len(), 1);
    }
}
