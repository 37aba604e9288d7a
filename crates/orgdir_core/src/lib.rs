//! Organization directory query core.
//!
//! Resolves organizations by building, activity (with taxonomy closure) and
//! geographic proximity over an interchangeable organization store.

pub mod config;
pub mod db;
pub mod geo;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;
pub mod taxonomy;

pub use config::{ConfigError, DatabaseConfig, DirectoryConfig, LoggingConfig, QueryConfig};
pub use geo::predicate::{AreaError, CircleArea, RectangleArea, SpatialArea};
pub use geo::projection::{project, unproject, GeoError, GeoPoint, ProjectedPoint};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
};
pub use model::activity::{Activity, ActivityId};
pub use model::building::{Building, BuildingId};
pub use model::organization::{
    NewOrganization, Organization, OrganizationId, OrganizationPhone, PhoneId,
};
pub use model::ValidationError;
pub use service::query_service::{
    DirectoryQueryService, QueryError, QueryResult, ScanCancellation,
};
pub use store::{
    ActivityLookup, DirectoryWriter, InMemoryOrganizationStore, LocatedBuilding,
    LocatedBuildingPage, LocatedBuildingScan, OrganizationStore, SqliteOrganizationStore,
    StoreError, StoreResult,
};
pub use taxonomy::{ActivityTable, ActivityTaxonomy, TaxonomyError, TaxonomyResult};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
