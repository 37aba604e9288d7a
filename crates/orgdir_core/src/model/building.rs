//! Building entity.

use crate::geo::projection::GeoPoint;
use crate::model::{ensure_not_blank, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type BuildingId = Uuid;

/// Physical building that hosts organizations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub id: BuildingId,
    pub address: String,
    /// Absent location excludes the building from proximity queries.
    pub location: Option<GeoPoint>,
}

impl Building {
    /// Creates a building with a generated id.
    pub fn new(address: impl Into<String>, location: Option<GeoPoint>) -> Self {
        Self {
            id: Uuid::new_v4(),
            address: address.into(),
            location,
        }
    }

    /// Creates a building located at `(latitude, longitude)`.
    pub fn located(address: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self::new(
            address,
            Some(GeoPoint {
                latitude,
                longitude,
            }),
        )
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        ensure_not_blank(&self.address, "address")?;
        if let Some(location) = self.location.as_ref() {
            location.validate()?;
        }
        Ok(())
    }
}
