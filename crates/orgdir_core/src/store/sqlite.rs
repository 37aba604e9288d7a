//! SQLite-backed organization store.
//!
//! # Responsibility
//! - Implement the store contract over the migrated directory schema.
//! - Hydrate organizations with building, phones and activities.
//!
//! # Invariants
//! - Connections must be at the latest schema version (`try_new` checks).
//! - Set queries bind ids in chunks below SQLite's variable limit.
//! - Organization writes run inside one immediate transaction.

use crate::db::migrations::latest_version;
use crate::geo::projection::{GeoError, GeoPoint};
use crate::model::activity::{Activity, ActivityId, ROOT_LEVEL};
use crate::model::building::{Building, BuildingId};
use crate::model::organization::{
    NewOrganization, Organization, OrganizationId, OrganizationPhone,
};
use crate::store::{
    derive_child_level, normalize_hydrated, ActivityLookup, DirectoryWriter, LocatedBuilding,
    LocatedBuildingPage, OrganizationStore, StoreError, StoreResult,
};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use uuid::Uuid;

const ORGANIZATION_SELECT_SQL: &str = "SELECT DISTINCT
    o.id AS id,
    o.name AS name,
    o.building_id AS building_id
FROM organizations o";

const BUILDING_SELECT_SQL: &str = "SELECT
    id,
    address,
    latitude,
    longitude
FROM buildings";

const ACTIVITY_SELECT_SQL: &str = "SELECT
    id,
    name,
    parent_id,
    level
FROM activities";

/// Ids bound per `IN (...)` clause.
const ID_CHUNK_SIZE: usize = 500;

/// Organization columns before hydration.
#[derive(Debug, Clone)]
struct OrganizationRow {
    id: OrganizationId,
    name: String,
    building_id: BuildingId,
}

#[derive(Debug)]
pub struct SqliteOrganizationStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteOrganizationStore<'conn> {
    /// Creates a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_store_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn hydrate(&self, row: OrganizationRow) -> StoreResult<Organization> {
        let building = self.building_by_id(row.building_id)?.ok_or_else(|| {
            StoreError::InvalidData(format!(
                "organization {} references missing building {}",
                row.id, row.building_id
            ))
        })?;

        let mut organization = Organization {
            id: row.id,
            name: row.name,
            building_id: row.building_id,
            building,
            phones: load_phones(self.conn, row.id)?,
            activities: load_activities_for_organization(self.conn, row.id)?,
        };
        normalize_hydrated(&mut organization);
        Ok(organization)
    }

    fn hydrate_all(
        &self,
        rows: impl IntoIterator<Item = OrganizationRow>,
    ) -> StoreResult<Vec<Organization>> {
        rows.into_iter().map(|row| self.hydrate(row)).collect()
    }

    /// Runs `where_sql` once per id chunk and merges rows by organization id.
    fn organizations_where_in(
        &self,
        where_sql: &str,
        ids: &[Uuid],
    ) -> StoreResult<Vec<Organization>> {
        let mut merged = BTreeMap::new();
        for chunk in ids.chunks(ID_CHUNK_SIZE) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "{ORGANIZATION_SELECT_SQL} {}",
                where_sql.replace("{ids}", &placeholders)
            );
            let bind_values: Vec<Value> = chunk
                .iter()
                .map(|id| Value::Text(id.to_string()))
                .collect();

            let mut stmt = self.conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(bind_values))?;
            while let Some(row) = rows.next()? {
                let parsed = parse_organization_row(row)?;
                merged.entry(parsed.id).or_insert(parsed);
            }
        }
        self.hydrate_all(merged.into_values())
    }
}

impl ActivityLookup for SqliteOrganizationStore<'_> {
    fn activity_by_id(&self, id: ActivityId) -> StoreResult<Option<Activity>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{ACTIVITY_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_activity_row(row)?));
        }
        Ok(None)
    }

    fn child_activity_ids(&self, parent_id: ActivityId) -> StoreResult<Vec<ActivityId>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id
             FROM activities
             WHERE parent_id = ?1
             ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query([parent_id.to_string()])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.push(parse_uuid(&value, "activities.id")?);
        }
        Ok(ids)
    }
}

impl OrganizationStore for SqliteOrganizationStore<'_> {
    fn building_by_id(&self, id: BuildingId) -> StoreResult<Option<Building>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{BUILDING_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_building_row(row)?));
        }
        Ok(None)
    }

    fn organization_by_id(&self, id: OrganizationId) -> StoreResult<Option<Organization>> {
        let row = {
            let mut stmt = self
                .conn
                .prepare_cached(&format!("{ORGANIZATION_SELECT_SQL} WHERE o.id = ?1;"))?;
            stmt.query_row([id.to_string()], |row| Ok(parse_organization_row(row)))
                .optional()?
                .transpose()?
        };
        row.map(|row| self.hydrate(row)).transpose()
    }

    fn organization_by_name(&self, name: &str) -> StoreResult<Option<Organization>> {
        // Names are not unique in the schema; the lowest id wins.
        let row = {
            let mut stmt = self.conn.prepare_cached(&format!(
                "{ORGANIZATION_SELECT_SQL} WHERE o.name = ?1 ORDER BY o.id ASC LIMIT 1;"
            ))?;
            stmt.query_row([name], |row| Ok(parse_organization_row(row)))
                .optional()?
                .transpose()?
        };
        row.map(|row| self.hydrate(row)).transpose()
    }

    fn organizations_by_building(&self, building_id: BuildingId) -> StoreResult<Vec<Organization>> {
        self.organizations_by_buildings(&[building_id])
    }

    fn organizations_by_activity_set(
        &self,
        activity_ids: &HashSet<ActivityId>,
    ) -> StoreResult<Vec<Organization>> {
        let mut ids: Vec<_> = activity_ids.iter().copied().collect();
        ids.sort_unstable();
        self.organizations_where_in(
            "INNER JOIN organization_activities oa ON oa.organization_id = o.id
             WHERE oa.activity_id IN ({ids})",
            &ids,
        )
    }

    fn organizations_by_buildings(
        &self,
        building_ids: &[BuildingId],
    ) -> StoreResult<Vec<Organization>> {
        self.organizations_where_in("WHERE o.building_id IN ({ids})", building_ids)
    }

    fn located_buildings_page(
        &self,
        after: Option<BuildingId>,
        limit: usize,
    ) -> StoreResult<LocatedBuildingPage> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{BUILDING_SELECT_SQL}
             WHERE latitude IS NOT NULL
               AND longitude IS NOT NULL
               AND (?1 IS NULL OR id > ?1)
             ORDER BY id ASC
             LIMIT ?2;"
        ))?;
        let limit_value = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut rows = stmt.query(params![after.map(|id| id.to_string()), limit_value])?;

        let mut page = LocatedBuildingPage::default();
        let mut examined = 0usize;
        while let Some(row) = rows.next()? {
            examined += 1;
            let building = parse_building_row(row)?;
            page.next_cursor = Some(building.id);

            let Some(location) = building.location else {
                continue;
            };
            match location.project() {
                Ok(projected) => page.buildings.push(LocatedBuilding {
                    building,
                    projected,
                }),
                Err(GeoError::Unprojectable { .. }) => {
                    debug!(
                        "event=scan_skip module=store status=ok reason=unprojectable building_id={}",
                        building.id
                    );
                }
                Err(err) => return Err(StoreError::InvalidData(err.to_string())),
            }
        }

        if examined < limit {
            page.next_cursor = None;
        }
        Ok(page)
    }
}

impl DirectoryWriter for SqliteOrganizationStore<'_> {
    fn create_building(&mut self, building: &Building) -> StoreResult<BuildingId> {
        building.validate()?;
        if self.building_by_id(building.id)?.is_some() {
            return Err(StoreError::Duplicate {
                entity: "building",
                id: building.id,
            });
        }

        self.conn.execute(
            "INSERT INTO buildings (id, address, latitude, longitude)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                building.id.to_string(),
                building.address.as_str(),
                building.location.map(|point| point.latitude),
                building.location.map(|point| point.longitude),
            ],
        )?;
        Ok(building.id)
    }

    fn create_activity(&mut self, activity: &Activity) -> StoreResult<Activity> {
        if self.activity_by_id(activity.id)?.is_some() {
            return Err(StoreError::Duplicate {
                entity: "activity",
                id: activity.id,
            });
        }

        let level = match activity.parent_id {
            None => ROOT_LEVEL,
            Some(parent_id) => derive_child_level(self, parent_id)?,
        };
        let stored = Activity {
            level,
            ..activity.clone()
        };
        stored.validate()?;

        self.conn.execute(
            "INSERT INTO activities (id, name, parent_id, level)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                stored.id.to_string(),
                stored.name.as_str(),
                stored.parent_id.map(|id| id.to_string()),
                stored.level,
            ],
        )?;
        Ok(stored)
    }

    fn create_organization(
        &mut self,
        organization: &NewOrganization,
    ) -> StoreResult<OrganizationId> {
        organization.validate()?;
        if self.building_by_id(organization.building_id)?.is_none() {
            return Err(StoreError::MissingReference {
                entity: "building",
                id: organization.building_id,
            });
        }
        let activity_ids: BTreeSet<_> = organization.activity_ids.iter().copied().collect();
        for activity_id in &activity_ids {
            if self.activity_by_id(*activity_id)?.is_none() {
                return Err(StoreError::MissingReference {
                    entity: "activity",
                    id: *activity_id,
                });
            }
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM organizations WHERE id = ?1);",
            [organization.id.to_string()],
            |row| row.get(0),
        )?;
        if exists {
            return Err(StoreError::Duplicate {
                entity: "organization",
                id: organization.id,
            });
        }

        tx.execute(
            "INSERT INTO organizations (id, name, building_id) VALUES (?1, ?2, ?3);",
            params![
                organization.id.to_string(),
                organization.name.as_str(),
                organization.building_id.to_string(),
            ],
        )?;
        for phone in &organization.phones {
            tx.execute(
                "INSERT INTO organization_phones (id, organization_id, phone)
                 VALUES (?1, ?2, ?3);",
                params![
                    Uuid::new_v4().to_string(),
                    organization.id.to_string(),
                    phone.as_str(),
                ],
            )?;
        }
        for activity_id in &activity_ids {
            tx.execute(
                "INSERT INTO organization_activities (organization_id, activity_id)
                 VALUES (?1, ?2);",
                params![organization.id.to_string(), activity_id.to_string()],
            )?;
        }
        tx.commit()?;

        Ok(organization.id)
    }

    fn delete_organization(&mut self, id: OrganizationId) -> StoreResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM organizations WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "organization",
                id,
            });
        }
        Ok(())
    }
}

fn load_phones(
    conn: &Connection,
    organization_id: OrganizationId,
) -> StoreResult<Vec<OrganizationPhone>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, phone
         FROM organization_phones
         WHERE organization_id = ?1
         ORDER BY phone ASC, id ASC;",
    )?;
    let mut rows = stmt.query([organization_id.to_string()])?;
    let mut phones = Vec::new();
    while let Some(row) = rows.next()? {
        let id_text: String = row.get("id")?;
        phones.push(OrganizationPhone {
            id: parse_uuid(&id_text, "organization_phones.id")?,
            phone: row.get("phone")?,
        });
    }
    Ok(phones)
}

fn load_activities_for_organization(
    conn: &Connection,
    organization_id: OrganizationId,
) -> StoreResult<Vec<Activity>> {
    let mut stmt = conn.prepare_cached(
        "SELECT a.id AS id, a.name AS name, a.parent_id AS parent_id, a.level AS level
         FROM activities a
         INNER JOIN organization_activities oa ON oa.activity_id = a.id
         WHERE oa.organization_id = ?1
         ORDER BY a.id ASC;",
    )?;
    let mut rows = stmt.query([organization_id.to_string()])?;
    let mut activities = Vec::new();
    while let Some(row) = rows.next()? {
        activities.push(parse_activity_row(row)?);
    }
    Ok(activities)
}

fn parse_organization_row(row: &Row<'_>) -> StoreResult<OrganizationRow> {
    let id_text: String = row.get("id")?;
    let building_text: String = row.get("building_id")?;
    Ok(OrganizationRow {
        id: parse_uuid(&id_text, "organizations.id")?,
        name: row.get("name")?,
        building_id: parse_uuid(&building_text, "organizations.building_id")?,
    })
}

fn parse_building_row(row: &Row<'_>) -> StoreResult<Building> {
    let id_text: String = row.get("id")?;
    let latitude: Option<f64> = row.get("latitude")?;
    let longitude: Option<f64> = row.get("longitude")?;

    let location = match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Some(GeoPoint {
            latitude,
            longitude,
        }),
        (None, None) => None,
        _ => {
            return Err(StoreError::InvalidData(format!(
                "building {id_text} has a partial location"
            )));
        }
    };

    let building = Building {
        id: parse_uuid(&id_text, "buildings.id")?,
        address: row.get("address")?,
        location,
    };
    building
        .validate()
        .map_err(|err| StoreError::InvalidData(format!("building {id_text}: {err}")))?;
    Ok(building)
}

fn parse_activity_row(row: &Row<'_>) -> StoreResult<Activity> {
    let id_text: String = row.get("id")?;
    let parent_id = row
        .get::<_, Option<String>>("parent_id")?
        .map(|value| parse_uuid(&value, "activities.parent_id"))
        .transpose()?;
    let level: i64 = row.get("level")?;
    let level = u32::try_from(level).map_err(|_| {
        StoreError::InvalidData(format!("invalid level `{level}` in activities.level"))
    })?;

    Ok(Activity {
        id: parse_uuid(&id_text, "activities.id")?,
        name: row.get("name")?,
        parent_id,
        level,
    })
}

fn parse_uuid(value: &str, column: &'static str) -> StoreResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| StoreError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn ensure_store_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}
