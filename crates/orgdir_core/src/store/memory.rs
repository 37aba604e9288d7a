//! In-memory organization store.
//!
//! # Responsibility
//! - Satisfy the store contract without a database, for embedding and tests.
//!
//! # Invariants
//! - Maps are ordered by id so scans and unions are deterministic.
//! - Writes enforce the same reference checks as the SQLite store.

use crate::geo::projection::GeoError;
use crate::model::activity::{Activity, ActivityId, ROOT_LEVEL};
use crate::model::building::{Building, BuildingId};
use crate::model::organization::{
    NewOrganization, Organization, OrganizationId, OrganizationPhone,
};
use crate::store::{
    derive_child_level, normalize_hydrated, ActivityLookup, DirectoryWriter, LocatedBuilding,
    LocatedBuildingPage, OrganizationStore, StoreError, StoreResult,
};
use crate::taxonomy::ActivityTable;
use log::debug;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::ops::Bound;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct OrganizationRow {
    name: String,
    building_id: BuildingId,
    phones: Vec<OrganizationPhone>,
    activity_ids: BTreeSet<ActivityId>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryOrganizationStore {
    buildings: BTreeMap<BuildingId, Building>,
    activities: ActivityTable,
    organizations: BTreeMap<OrganizationId, OrganizationRow>,
}

impl InMemoryOrganizationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn hydrate(&self, id: OrganizationId, row: &OrganizationRow) -> StoreResult<Organization> {
        let building = self.buildings.get(&row.building_id).cloned().ok_or_else(|| {
            StoreError::InvalidData(format!(
                "organization {id} references missing building {}",
                row.building_id
            ))
        })?;

        let mut activities = Vec::with_capacity(row.activity_ids.len());
        for activity_id in &row.activity_ids {
            let activity = self.activities.get(*activity_id).cloned().ok_or_else(|| {
                StoreError::InvalidData(format!(
                    "organization {id} references missing activity {activity_id}"
                ))
            })?;
            activities.push(activity);
        }

        let mut organization = Organization {
            id,
            name: row.name.clone(),
            building_id: row.building_id,
            building,
            phones: row.phones.clone(),
            activities,
        };
        normalize_hydrated(&mut organization);
        Ok(organization)
    }

    fn hydrate_where<P>(&self, mut predicate: P) -> StoreResult<Vec<Organization>>
    where
        P: FnMut(&OrganizationRow) -> bool,
    {
        self.organizations
            .iter()
            .filter(|(_, row)| predicate(row))
            .map(|(id, row)| self.hydrate(*id, row))
            .collect()
    }
}

impl ActivityLookup for InMemoryOrganizationStore {
    fn activity_by_id(&self, id: ActivityId) -> StoreResult<Option<Activity>> {
        self.activities.activity_by_id(id)
    }

    fn child_activity_ids(&self, parent_id: ActivityId) -> StoreResult<Vec<ActivityId>> {
        self.activities.child_activity_ids(parent_id)
    }
}

impl OrganizationStore for InMemoryOrganizationStore {
    fn building_by_id(&self, id: BuildingId) -> StoreResult<Option<Building>> {
        Ok(self.buildings.get(&id).cloned())
    }

    fn organization_by_id(&self, id: OrganizationId) -> StoreResult<Option<Organization>> {
        self.organizations
            .get(&id)
            .map(|row| self.hydrate(id, row))
            .transpose()
    }

    fn organization_by_name(&self, name: &str) -> StoreResult<Option<Organization>> {
        self.organizations
            .iter()
            .find(|(_, row)| row.name == name)
            .map(|(id, row)| self.hydrate(*id, row))
            .transpose()
    }

    fn organizations_by_building(&self, building_id: BuildingId) -> StoreResult<Vec<Organization>> {
        self.hydrate_where(|row| row.building_id == building_id)
    }

    fn organizations_by_activity_set(
        &self,
        activity_ids: &HashSet<ActivityId>,
    ) -> StoreResult<Vec<Organization>> {
        self.hydrate_where(|row| row.activity_ids.iter().any(|id| activity_ids.contains(id)))
    }

    fn organizations_by_buildings(
        &self,
        building_ids: &[BuildingId],
    ) -> StoreResult<Vec<Organization>> {
        let wanted: HashSet<_> = building_ids.iter().copied().collect();
        self.hydrate_where(|row| wanted.contains(&row.building_id))
    }

    fn located_buildings_page(
        &self,
        after: Option<BuildingId>,
        limit: usize,
    ) -> StoreResult<LocatedBuildingPage> {
        let lower = match after {
            Some(id) => Bound::Excluded(id),
            None => Bound::Unbounded,
        };

        let mut page = LocatedBuildingPage::default();
        let mut examined = 0usize;
        let located = self
            .buildings
            .range((lower, Bound::Unbounded))
            .filter_map(|(_, building)| building.location.map(|location| (building, location)));
        for (building, location) in located.take(limit) {
            examined += 1;
            page.next_cursor = Some(building.id);
            match location.project() {
                Ok(projected) => page.buildings.push(LocatedBuilding {
                    building: building.clone(),
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

impl DirectoryWriter for InMemoryOrganizationStore {
    fn create_building(&mut self, building: &Building) -> StoreResult<BuildingId> {
        building.validate()?;
        if self.buildings.contains_key(&building.id) {
            return Err(StoreError::Duplicate {
                entity: "building",
                id: building.id,
            });
        }
        self.buildings.insert(building.id, building.clone());
        Ok(building.id)
    }

    fn create_activity(&mut self, activity: &Activity) -> StoreResult<Activity> {
        if self.activities.contains(activity.id) {
            return Err(StoreError::Duplicate {
                entity: "activity",
                id: activity.id,
            });
        }

        let level = match activity.parent_id {
            None => ROOT_LEVEL,
            Some(parent_id) => derive_child_level(&self.activities, parent_id)?,
        };
        let stored = Activity {
            level,
            ..activity.clone()
        };
        stored.validate()?;
        self.activities.insert(stored.clone());
        Ok(stored)
    }

    fn create_organization(
        &mut self,
        organization: &NewOrganization,
    ) -> StoreResult<OrganizationId> {
        organization.validate()?;
        if self.organizations.contains_key(&organization.id) {
            return Err(StoreError::Duplicate {
                entity: "organization",
                id: organization.id,
            });
        }
        if !self.buildings.contains_key(&organization.building_id) {
            return Err(StoreError::MissingReference {
                entity: "building",
                id: organization.building_id,
            });
        }
        if let Some(missing) = organization
            .activity_ids
            .iter()
            .find(|id| !self.activities.contains(**id))
        {
            return Err(StoreError::MissingReference {
                entity: "activity",
                id: *missing,
            });
        }

        let phones = organization
            .phones
            .iter()
            .map(|phone| OrganizationPhone {
                id: Uuid::new_v4(),
                phone: phone.clone(),
            })
            .collect();
        self.organizations.insert(
            organization.id,
            OrganizationRow {
                name: organization.name.clone(),
                building_id: organization.building_id,
                phones,
                activity_ids: organization.activity_ids.iter().copied().collect(),
            },
        );
        Ok(organization.id)
    }

    fn delete_organization(&mut self, id: OrganizationId) -> StoreResult<()> {
        self.organizations
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound {
                entity: "organization",
                id,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryOrganizationStore;
    use crate::model::activity::Activity;
    use crate::store::{DirectoryWriter, StoreError};
    use uuid::Uuid;

    #[test]
    fn caller_supplied_level_is_replaced_by_derived_level() {
        let mut store = InMemoryOrganizationStore::new();
        let root = store.create_activity(&Activity::root("Root")).unwrap();
        let mut child = Activity::child_of(&root, "Child");
        child.level = 9;

        let stored = store.create_activity(&child).unwrap();
        assert_eq!(stored.level, 2);
    }

    #[test]
    fn unknown_parent_is_missing_reference() {
        let mut store = InMemoryOrganizationStore::new();
        let parent_id = Uuid::new_v4();
        let orphan = Activity {
            parent_id: Some(parent_id),
            level: 2,
            ..Activity::root("Orphan")
        };

        let err = store.create_activity(&orphan).unwrap_err();
        assert!(matches!(
            err,
            StoreError::MissingReference { entity: "activity", id } if id == parent_id
        ));
    }
}
