//! Visibility targeting shared by posts and events.
//!
//! An entity is visible to an employee when any of its four join collections
//! names one of the employee's dimension values: a team they belong to, their
//! department, their location, or the employee directly. "Everyone" targeting
//! is expanded into join rows at write time, so reads only ever consult the
//! join collections.

use std::collections::BTreeSet;
use std::rc::Rc;

use rusqlite::types::Value;
use rusqlite::vtab::array::Array;
use serde::Deserialize;

use super::*;

/// One kind of targeting join collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetDimension {
    Team,
    Department,
    Location,
    Employee,
}

impl TargetDimension {
    pub const ALL: [TargetDimension; 4] = [
        TargetDimension::Team,
        TargetDimension::Department,
        TargetDimension::Location,
        TargetDimension::Employee,
    ];
}

/// The join collections of one targetable entity kind.
#[derive(Debug, Clone, Copy)]
pub struct TargetTables {
    /// Column holding the entity id in every join table.
    pub entity_column: &'static str,
    pub team_table: &'static str,
    pub department_table: &'static str,
    pub location_table: &'static str,
    pub employee_table: &'static str,
    /// `(entity table, owner column)`: owners always see their own entities.
    pub owner: Option<(&'static str, &'static str)>,
}

impl TargetTables {
    pub fn table(&self, dimension: TargetDimension) -> &'static str {
        match dimension {
            TargetDimension::Team => self.team_table,
            TargetDimension::Department => self.department_table,
            TargetDimension::Location => self.location_table,
            TargetDimension::Employee => self.employee_table,
        }
    }

    pub fn value_column(&self, dimension: TargetDimension) -> &'static str {
        match dimension {
            TargetDimension::Team => "team_id",
            TargetDimension::Department => "department_id",
            TargetDimension::Location => "location",
            TargetDimension::Employee => "employee_id",
        }
    }
}

pub const POST_TARGETS: TargetTables = TargetTables {
    entity_column: "post_id",
    team_table: "post_teams",
    department_table: "post_departments",
    location_table: "post_locations",
    employee_table: "post_employees",
    owner: None,
};

pub const EVENT_TARGETS: TargetTables = TargetTables {
    entity_column: "event_id",
    team_table: "event_teams",
    department_table: "event_departments",
    location_table: "event_locations",
    employee_table: "event_employees",
    owner: Some(("events", "creator_id")),
};

/// The dimension values that identify one employee for targeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Audience {
    pub employee_id: String,
    pub department_id: Option<String>,
    pub location: Option<String>,
    pub team_ids: Vec<String>,
}

/// Requested targeting for a new post or event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Targets {
    pub everyone: bool,
    pub team_ids: Vec<String>,
    pub department_ids: Vec<String>,
    pub locations: Vec<String>,
    pub employee_ids: Vec<String>,
}

impl Targets {
    pub fn is_empty(&self) -> bool {
        !self.everyone
            && self.team_ids.is_empty()
            && self.department_ids.is_empty()
            && self.locations.is_empty()
            && self.employee_ids.is_empty()
    }

    fn values(&self, dimension: TargetDimension) -> &[String] {
        match dimension {
            TargetDimension::Team => &self.team_ids,
            TargetDimension::Department => &self.department_ids,
            TargetDimension::Location => &self.locations,
            TargetDimension::Employee => &self.employee_ids,
        }
    }
}

impl PulseDb {
    /// Resolve department, location and team memberships for an employee.
    /// `None` when the employee does not exist.
    pub fn audience_for(&self, employee_id: &str) -> Result<Option<Audience>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT department_id, location FROM employees WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![employee_id], |row| {
            Ok((
                row.get::<_, Option<String>>(0)?,
                row.get::<_, Option<String>>(1)?,
            ))
        })?;
        let (department_id, location) = match rows.next() {
            Some(row) => row?,
            None => return Ok(None),
        };

        let mut stmt = self
            .conn
            .prepare("SELECT team_id FROM team_employees WHERE employee_id = ?1")?;
        let rows = stmt.query_map(params![employee_id], |row| row.get::<_, String>(0))?;
        let mut team_ids = Vec::new();
        for row in rows {
            team_ids.push(row?);
        }

        Ok(Some(Audience {
            employee_id: employee_id.to_string(),
            department_id,
            location: location.filter(|l| !l.trim().is_empty()),
            team_ids,
        }))
    }

    /// Union of entity ids reachable through any targeting dimension (plus
    /// owned entities when the kind has an owner column). Set semantics: an
    /// entity matched on several dimensions appears once.
    pub fn visible_entity_ids(
        &self,
        tables: &TargetTables,
        audience: &Audience,
    ) -> Result<BTreeSet<String>, DbError> {
        let mut ids = BTreeSet::new();

        if !audience.team_ids.is_empty() {
            let sql = format!(
                "SELECT {} FROM {} WHERE team_id IN rarray(?1)",
                tables.entity_column, tables.team_table
            );
            self.collect_ids(&sql, params![id_array(&audience.team_ids)], &mut ids)?;
        }

        if let Some(ref department_id) = audience.department_id {
            let sql = format!(
                "SELECT {} FROM {} WHERE department_id = ?1",
                tables.entity_column, tables.department_table
            );
            self.collect_ids(&sql, params![department_id], &mut ids)?;
        }

        if let Some(ref location) = audience.location {
            let sql = format!(
                "SELECT {} FROM {} WHERE location = ?1",
                tables.entity_column, tables.location_table
            );
            self.collect_ids(&sql, params![location], &mut ids)?;
        }

        let sql = format!(
            "SELECT {} FROM {} WHERE employee_id = ?1",
            tables.entity_column, tables.employee_table
        );
        self.collect_ids(&sql, params![audience.employee_id], &mut ids)?;

        if let Some((entity_table, owner_column)) = tables.owner {
            let sql = format!("SELECT id FROM {entity_table} WHERE {owner_column} = ?1");
            self.collect_ids(&sql, params![audience.employee_id], &mut ids)?;
        }

        Ok(ids)
    }

    fn collect_ids<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
        ids: &mut BTreeSet<String>,
    ) -> Result<(), DbError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| row.get::<_, String>(0))?;
        for row in rows {
            ids.insert(row?);
        }
        Ok(())
    }

    /// Write the targeting join rows for a new entity. `everyone` is expanded
    /// to every team, department and known location. Duplicate values are
    /// ignored (one row per entity + value). Returns the number of rows written.
    pub fn insert_targets(
        &self,
        tables: &TargetTables,
        entity_id: &str,
        targets: &Targets,
    ) -> Result<usize, DbError> {
        let expanded;
        let targets = if targets.everyone {
            expanded = Targets {
                everyone: true,
                team_ids: self.get_all_teams()?.into_iter().map(|t| t.id).collect(),
                department_ids: self
                    .get_all_departments()?
                    .into_iter()
                    .map(|d| d.id)
                    .collect(),
                locations: self.get_all_locations()?,
                employee_ids: targets.employee_ids.clone(),
            };
            &expanded
        } else {
            targets
        };

        let mut written = 0;
        for dimension in TargetDimension::ALL {
            let sql = format!(
                "INSERT OR IGNORE INTO {} ({}, {}) VALUES (?1, ?2)",
                tables.table(dimension),
                tables.entity_column,
                tables.value_column(dimension)
            );
            let mut stmt = self.conn.prepare(&sql)?;
            for value in targets.values(dimension) {
                let value = value.trim();
                if value.is_empty() {
                    continue;
                }
                written += stmt.execute(params![entity_id, value])?;
            }
        }
        Ok(written)
    }

    /// Remove every targeting row of an entity.
    pub fn delete_targets(&self, tables: &TargetTables, entity_id: &str) -> Result<(), DbError> {
        for dimension in TargetDimension::ALL {
            let sql = format!(
                "DELETE FROM {} WHERE {} = ?1",
                tables.table(dimension),
                tables.entity_column
            );
            self.conn.execute(&sql, params![entity_id])?;
        }
        Ok(())
    }

    /// Ids among `targets` that reference missing teams, departments or
    /// employees. Locations are free text and never reported.
    pub fn unknown_target_ids(&self, targets: &Targets) -> Result<Vec<String>, DbError> {
        let mut missing = Vec::new();
        for id in &targets.team_ids {
            if !self.exists_by("teams", "id", id)? {
                missing.push(id.clone());
            }
        }
        for id in &targets.department_ids {
            if !self.exists_by("departments", "id", id)? {
                missing.push(id.clone());
            }
        }
        for id in &targets.employee_ids {
            if !self.exists_by("employees", "id", id)? {
                missing.push(id.clone());
            }
        }
        Ok(missing)
    }
}

/// An id list bound as one `rarray(?)` parameter, so the list length is not
/// limited by SQLite's host-parameter cap.
pub(crate) fn id_array(ids: &[String]) -> Array {
    Rc::new(ids.iter().cloned().map(Value::from).collect())
}
