//! Directory query use-case service.
//!
//! # Responsibility
//! - Validate query input before touching the store.
//! - Compose taxonomy closure and spatial predicates over one store.
//!
//! # Invariants
//! - Malformed numeric input fails with `InvalidArgument` before any store call.
//! - Lookup misses return `None` / empty results, not errors.
//! - Result lists are de-duplicated and ordered by organization id.
//! - The service never mutates the store.

use crate::config::QueryConfig;
use crate::geo::predicate::{AreaError, CircleArea, RectangleArea, SpatialArea};
use crate::geo::projection::{project, ProjectedPoint};
use crate::model::activity::ActivityId;
use crate::model::building::BuildingId;
use crate::model::organization::{Organization, OrganizationId};
use crate::store::{OrganizationStore, StoreError};
use crate::taxonomy::{ActivityTaxonomy, TaxonomyError};
use log::{info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub type QueryResult<T> = Result<T, QueryError>;

/// Errors surfaced to directory callers.
#[derive(Debug)]
pub enum QueryError {
    /// Input rejected before reaching the store.
    InvalidArgument {
        parameter: &'static str,
        message: String,
    },
    /// Root activity for a closure query does not exist.
    NotFound(ActivityId),
    /// Taxonomy walk hit a cycle or exceeded the depth cap.
    TaxonomyTooDeep {
        root_id: ActivityId,
        max_depth: usize,
        cycle_at: Option<ActivityId>,
    },
    /// Transient store failure; the caller may retry with backoff.
    StoreUnavailable(String),
    /// Caller cancelled a spatial scan.
    Cancelled,
    /// Any other store failure. Fatal to the request.
    Store(StoreError),
}

impl QueryError {
    /// HTTP status the transport layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidArgument { .. } | Self::TaxonomyTooDeep { .. } => 400,
            Self::NotFound(_) => 404,
            Self::Cancelled => 499,
            Self::StoreUnavailable(_) => 503,
            Self::Store(_) => 500,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::NotFound(_) => "not_found",
            Self::TaxonomyTooDeep { .. } => "taxonomy_too_deep",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::Cancelled => "cancelled",
            Self::Store(_) => "store_error",
        }
    }
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument { parameter, message } => {
                write!(f, "invalid `{parameter}`: {message}")
            }
            Self::NotFound(id) => write!(f, "activity not found: {id}"),
            Self::TaxonomyTooDeep {
                root_id,
                max_depth,
                cycle_at,
            } => {
                let err = TaxonomyError::TooDeep {
                    root_id: *root_id,
                    max_depth: *max_depth,
                    cycle_at: *cycle_at,
                };
                write!(f, "{err}")
            }
            Self::StoreUnavailable(message) => write!(f, "store unavailable: {message}"),
            Self::Cancelled => write!(f, "query cancelled"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for QueryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for QueryError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Unavailable(message) => Self::StoreUnavailable(message),
            other => Self::Store(other),
        }
    }
}

impl From<TaxonomyError> for QueryError {
    fn from(value: TaxonomyError) -> Self {
        match value {
            TaxonomyError::NotFound(id) => Self::NotFound(id),
            TaxonomyError::TooDeep {
                root_id,
                max_depth,
                cycle_at,
            } => Self::TaxonomyTooDeep {
                root_id,
                max_depth,
                cycle_at,
            },
            TaxonomyError::Store(err) => err.into(),
        }
    }
}

impl From<AreaError> for QueryError {
    fn from(value: AreaError) -> Self {
        let parameter = match value {
            AreaError::InvalidRadius(_) => "radius",
            AreaError::InvalidDimensions { .. } => "width/height",
        };
        Self::InvalidArgument {
            parameter,
            message: value.to_string(),
        }
    }
}

/// Cooperative cancellation flag for spatial scans.
///
/// Clones share one flag; the scan checks it before fetching each batch.
#[derive(Debug, Clone, Default)]
pub struct ScanCancellation {
    cancelled: Arc<AtomicBool>,
}

impl ScanCancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Query engine facade over one organization store.
pub struct DirectoryQueryService<S: OrganizationStore> {
    store: S,
    taxonomy: ActivityTaxonomy,
    scan_batch_size: usize,
}

impl<S: OrganizationStore> DirectoryQueryService<S> {
    /// Creates a service with default query limits.
    pub fn new(store: S) -> Self {
        Self::with_config(store, &QueryConfig::default())
    }

    pub fn with_config(store: S, config: &QueryConfig) -> Self {
        Self {
            store,
            taxonomy: ActivityTaxonomy::new(config.max_taxonomy_depth),
            scan_batch_size: config.scan_batch_size.max(1),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Organizations housed in `building_id`. Unknown buildings yield an empty list.
    pub fn by_building(&self, building_id: BuildingId) -> QueryResult<Vec<Organization>> {
        let started_at = Instant::now();
        let result = self
            .store
            .organizations_by_building(building_id)
            .map_err(QueryError::from)
            .map(finalize);
        log_list_outcome("by_building", started_at, &result);
        result
    }

    /// Organizations tagged with exactly `activity_id` (no closure).
    pub fn by_activity(&self, activity_id: ActivityId) -> QueryResult<Vec<Organization>> {
        let started_at = Instant::now();
        let result = self
            .store
            .organizations_by_activity_set(&HashSet::from([activity_id]))
            .map_err(QueryError::from)
            .map(finalize);
        log_list_outcome("by_activity", started_at, &result);
        result
    }

    /// Organizations tagged with `activity_id` or any of its descendants.
    pub fn by_activity_type(&self, activity_id: ActivityId) -> QueryResult<Vec<Organization>> {
        let started_at = Instant::now();
        let result = self.by_activity_type_inner(activity_id);
        log_list_outcome("by_activity_type", started_at, &result);
        result
    }

    /// Organizations whose building lies within `radius_m` meters (projected) of the point.
    pub fn in_circle(
        &self,
        latitude: f64,
        longitude: f64,
        radius_m: f64,
    ) -> QueryResult<Vec<Organization>> {
        self.in_circle_inner(latitude, longitude, radius_m, None)
    }

    /// Like [`Self::in_circle`], aborting between scan batches once `cancellation` fires.
    pub fn in_circle_cancellable(
        &self,
        latitude: f64,
        longitude: f64,
        radius_m: f64,
        cancellation: &ScanCancellation,
    ) -> QueryResult<Vec<Organization>> {
        self.in_circle_inner(latitude, longitude, radius_m, Some(cancellation))
    }

    /// Organizations whose building lies in a `width_m` x `height_m` projected box
    /// centered on the point.
    pub fn in_rectangle(
        &self,
        center_latitude: f64,
        center_longitude: f64,
        width_m: f64,
        height_m: f64,
    ) -> QueryResult<Vec<Organization>> {
        self.in_rectangle_inner(center_latitude, center_longitude, width_m, height_m, None)
    }

    pub fn in_rectangle_cancellable(
        &self,
        center_latitude: f64,
        center_longitude: f64,
        width_m: f64,
        height_m: f64,
        cancellation: &ScanCancellation,
    ) -> QueryResult<Vec<Organization>> {
        self.in_rectangle_inner(
            center_latitude,
            center_longitude,
            width_m,
            height_m,
            Some(cancellation),
        )
    }

    pub fn by_id(&self, id: OrganizationId) -> QueryResult<Option<Organization>> {
        let started_at = Instant::now();
        let result = self.store.organization_by_id(id).map_err(QueryError::from);
        log_lookup_outcome("by_id", started_at, &result);
        result
    }

    /// Exact-name lookup. With duplicate names the lowest id is returned.
    pub fn by_name(&self, name: &str) -> QueryResult<Option<Organization>> {
        let started_at = Instant::now();
        let result = self.store.organization_by_name(name).map_err(QueryError::from);
        log_lookup_outcome("by_name", started_at, &result);
        result
    }

    fn by_activity_type_inner(&self, activity_id: ActivityId) -> QueryResult<Vec<Organization>> {
        let closure = self.taxonomy.descendants(&self.store, activity_id)?;
        let organizations = self.store.organizations_by_activity_set(&closure)?;
        Ok(finalize(organizations))
    }

    fn in_circle_inner(
        &self,
        latitude: f64,
        longitude: f64,
        radius_m: f64,
        cancellation: Option<&ScanCancellation>,
    ) -> QueryResult<Vec<Organization>> {
        let started_at = Instant::now();
        let result = project_center(latitude, longitude)
            .and_then(|center| CircleArea::new(center, radius_m).map_err(QueryError::from))
            .and_then(|area| self.scan_area(&area, cancellation));
        log_list_outcome("in_circle", started_at, &result);
        result
    }

    fn in_rectangle_inner(
        &self,
        center_latitude: f64,
        center_longitude: f64,
        width_m: f64,
        height_m: f64,
        cancellation: Option<&ScanCancellation>,
    ) -> QueryResult<Vec<Organization>> {
        let started_at = Instant::now();
        let result = project_center(center_latitude, center_longitude)
            .and_then(|center| {
                RectangleArea::new(center, width_m, height_m).map_err(QueryError::from)
            })
            .and_then(|area| self.scan_area(&area, cancellation));
        log_list_outcome("in_rectangle", started_at, &result);
        result
    }

    fn scan_area<A: SpatialArea>(
        &self,
        area: &A,
        cancellation: Option<&ScanCancellation>,
    ) -> QueryResult<Vec<Organization>> {
        let mut scan = self.store.all_buildings_with_location(self.scan_batch_size);
        let mut matched: Vec<BuildingId> = Vec::new();
        loop {
            if cancellation.is_some_and(ScanCancellation::is_cancelled) {
                return Err(QueryError::Cancelled);
            }
            let Some(batch) = scan.next() else {
                break;
            };
            matched.extend(
                batch?
                    .iter()
                    .filter(|located| area.contains(&located.projected))
                    .map(|located| located.building.id),
            );
        }

        if matched.is_empty() {
            return Ok(Vec::new());
        }
        let organizations = self.store.organizations_by_buildings(&matched)?;
        Ok(finalize(organizations))
    }
}

fn project_center(latitude: f64, longitude: f64) -> QueryResult<ProjectedPoint> {
    project(latitude, longitude).map_err(|err| QueryError::InvalidArgument {
        parameter: "latitude/longitude",
        message: err.to_string(),
    })
}

fn finalize(mut organizations: Vec<Organization>) -> Vec<Organization> {
    organizations.sort_by(|left, right| left.id.cmp(&right.id));
    organizations.dedup_by(|left, right| left.id == right.id);
    organizations
}

fn log_list_outcome(query: &str, started_at: Instant, result: &QueryResult<Vec<Organization>>) {
    match result {
        Ok(organizations) => info!(
            "event=query_{} module=service status=ok duration_ms={} result_count={}",
            query,
            started_at.elapsed().as_millis(),
            organizations.len()
        ),
        Err(err) => log_error(query, started_at, err),
    }
}

fn log_lookup_outcome(
    query: &str,
    started_at: Instant,
    result: &QueryResult<Option<Organization>>,
) {
    match result {
        Ok(found) => info!(
            "event=query_{} module=service status=ok duration_ms={} found={}",
            query,
            started_at.elapsed().as_millis(),
            found.is_some()
        ),
        Err(err) => log_error(query, started_at, err),
    }
}

fn log_error(query: &str, started_at: Instant, err: &QueryError) {
    warn!(
        "event=query_{} module=service status=error duration_ms={} error_code={} error={}",
        query,
        started_at.elapsed().as_millis(),
        err.error_code(),
        err
    );
}
