//! Organization graph store contracts.
//!
//! # Responsibility
//! - Define the lookup/scan capability the query engine depends on.
//! - Define the fixture write path used to load directory data.
//! - Provide batched iteration over located buildings for spatial scans.
//!
//! # Invariants
//! - Every `Organization` returned is fully hydrated (building, phones, activities).
//! - Lookup misses are `Ok(None)` / empty results, never errors.
//! - `StoreError::Unavailable` is reserved for transient conditions.

use crate::db::DbError;
use crate::geo::projection::ProjectedPoint;
use crate::model::activity::{Activity, ActivityId};
use crate::model::building::{Building, BuildingId};
use crate::model::organization::{NewOrganization, Organization, OrganizationId};
use crate::model::ValidationError;
use crate::taxonomy::{ActivityTaxonomy, TaxonomyError};
use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryOrganizationStore;
pub use sqlite::SqliteOrganizationStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by store implementations.
#[derive(Debug)]
pub enum StoreError {
    /// Transient backend condition (busy, locked, cannot open). Retryable.
    Unavailable(String),
    /// Non-transient database failure.
    Db(DbError),
    /// Write input violates an entity invariant.
    Validation(ValidationError),
    /// Write references an entity that does not exist.
    MissingReference {
        entity: &'static str,
        id: uuid::Uuid,
    },
    /// Write target does not exist.
    NotFound {
        entity: &'static str,
        id: uuid::Uuid,
    },
    /// Write would duplicate an existing id.
    Duplicate {
        entity: &'static str,
        id: uuid::Uuid,
    },
    /// Persisted data cannot be converted into a valid entity.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "store unavailable: {message}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::MissingReference { entity, id } => {
                write!(f, "referenced {entity} does not exist: {id}")
            }
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Duplicate { entity, id } => write!(f, "{entity} already exists: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted directory data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "directory store requires schema version {expected_version}, got {actual_version}"
            ),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        if value.is_transient() {
            Self::Unavailable(value.to_string())
        } else {
            Self::Db(value)
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::from(DbError::Sqlite(value))
    }
}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Building with a location, paired with its projected coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedBuilding {
    pub building: Building,
    pub projected: ProjectedPoint,
}

/// One keyset page of the located-building scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocatedBuildingPage {
    pub buildings: Vec<LocatedBuilding>,
    /// Last building id examined when the page was full; `None` ends the scan.
    ///
    /// Rows skipped as unprojectable still advance the cursor, so a page may be
    /// empty while the scan continues.
    pub next_cursor: Option<BuildingId>,
}

/// Child-link lookups over the activity forest.
pub trait ActivityLookup {
    /// Loads one activity by id.
    fn activity_by_id(&self, id: ActivityId) -> StoreResult<Option<Activity>>;
    /// Lists ids of activities whose `parent_id` equals `parent_id`, ordered by id.
    fn child_activity_ids(&self, parent_id: ActivityId) -> StoreResult<Vec<ActivityId>>;
}

/// Read capability consumed by the query engine.
pub trait OrganizationStore: ActivityLookup {
    fn building_by_id(&self, id: BuildingId) -> StoreResult<Option<Building>>;
    fn organization_by_id(&self, id: OrganizationId) -> StoreResult<Option<Organization>>;
    /// First match by exact name. Uniqueness is assumed, not enforced.
    fn organization_by_name(&self, name: &str) -> StoreResult<Option<Organization>>;
    fn organizations_by_building(&self, building_id: BuildingId) -> StoreResult<Vec<Organization>>;
    /// Union of organizations linked to any id in `activity_ids`, each once.
    fn organizations_by_activity_set(
        &self,
        activity_ids: &HashSet<ActivityId>,
    ) -> StoreResult<Vec<Organization>>;
    /// Examines up to `limit` located buildings ordered by id, strictly after `after`.
    fn located_buildings_page(
        &self,
        after: Option<BuildingId>,
        limit: usize,
    ) -> StoreResult<LocatedBuildingPage>;

    /// Union of organizations housed in any of `building_ids`, each once.
    fn organizations_by_buildings(
        &self,
        building_ids: &[BuildingId],
    ) -> StoreResult<Vec<Organization>> {
        let mut merged = BTreeMap::new();
        for building_id in building_ids {
            for organization in self.organizations_by_building(*building_id)? {
                merged.entry(organization.id).or_insert(organization);
            }
        }
        Ok(merged.into_values().collect())
    }

    /// Lazily iterates every located building in pages of `batch_size`.
    fn all_buildings_with_location(&self, batch_size: usize) -> LocatedBuildingScan<'_, Self>
    where
        Self: Sized,
    {
        LocatedBuildingScan::new(self, batch_size)
    }
}

/// Fixture write path. Not used by queries.
pub trait DirectoryWriter {
    fn create_building(&mut self, building: &Building) -> StoreResult<BuildingId>;
    /// Inserts an activity. The stored level is derived from the parent.
    fn create_activity(&mut self, activity: &Activity) -> StoreResult<Activity>;
    /// Inserts an organization with its phones and activity links atomically.
    fn create_organization(&mut self, organization: &NewOrganization)
        -> StoreResult<OrganizationId>;
    /// Deletes an organization with its phones and activity links.
    fn delete_organization(&mut self, id: OrganizationId) -> StoreResult<()>;
}

/// Batched, keyset-paginated scan over located buildings.
///
/// Each `next()` issues one store call; callers may stop between batches.
pub struct LocatedBuildingScan<'store, S: OrganizationStore + ?Sized> {
    store: &'store S,
    batch_size: usize,
    cursor: Option<BuildingId>,
    exhausted: bool,
}

impl<'store, S: OrganizationStore + ?Sized> LocatedBuildingScan<'store, S> {
    pub fn new(store: &'store S, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            cursor: None,
            exhausted: false,
        }
    }
}

impl<S: OrganizationStore + ?Sized> Iterator for LocatedBuildingScan<'_, S> {
    type Item = StoreResult<Vec<LocatedBuilding>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        match self.store.located_buildings_page(self.cursor, self.batch_size) {
            Ok(page) => {
                match page.next_cursor {
                    Some(cursor) => self.cursor = Some(cursor),
                    None => self.exhausted = true,
                }
                Some(Ok(page.buildings))
            }
            Err(err) => {
                self.exhausted = true;
                Some(Err(err))
            }
        }
    }
}

/// Level for a new child of `parent_id`, counted along the parent's ancestor
/// chain rather than read from the parent's stored level.
pub(crate) fn derive_child_level<L>(lookup: &L, parent_id: ActivityId) -> StoreResult<u32>
where
    L: ActivityLookup + ?Sized,
{
    match ActivityTaxonomy::default().level_of(lookup, parent_id) {
        Ok(level) => Ok(level.saturating_add(1)),
        Err(TaxonomyError::NotFound(id)) => Err(StoreError::MissingReference {
            entity: "activity",
            id,
        }),
        Err(TaxonomyError::Store(err)) => Err(err),
        Err(err @ TaxonomyError::TooDeep { .. }) => Err(StoreError::InvalidData(err.to_string())),
    }
}

/// Sorts phones and activities into their documented order.
pub(crate) fn normalize_hydrated(organization: &mut Organization) {
    organization
        .phones
        .sort_by(|left, right| left.phone.cmp(&right.phone).then(left.id.cmp(&right.id)));
    organization
        .activities
        .sort_by(|left, right| left.id.cmp(&right.id));
}
