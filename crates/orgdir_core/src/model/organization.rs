//! Organization aggregate and its phones.
//!
//! # Invariants
//! - An organization references exactly one building.
//! - Phones are owned by their organization and deleted with it.
//! - A hydrated `Organization` carries its full building, phone and activity sets.

use crate::model::activity::{Activity, ActivityId};
use crate::model::building::{Building, BuildingId};
use crate::model::{ensure_not_blank, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type OrganizationId = Uuid;
pub type PhoneId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationPhone {
    pub id: PhoneId,
    pub phone: String,
}

/// Fully hydrated organization as returned by queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    pub building_id: BuildingId,
    pub building: Building,
    /// Ordered by phone number, then id.
    pub phones: Vec<OrganizationPhone>,
    /// Ordered by activity id.
    pub activities: Vec<Activity>,
}

impl Organization {
    pub fn has_activity(&self, activity_id: ActivityId) -> bool {
        self.activities
            .iter()
            .any(|activity| activity.id == activity_id)
    }
}

/// Write model for creating an organization with its phones and activity links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrganization {
    pub id: OrganizationId,
    pub name: String,
    pub building_id: BuildingId,
    pub phones: Vec<String>,
    pub activity_ids: Vec<ActivityId>,
}

impl NewOrganization {
    pub fn new(name: impl Into<String>, building_id: BuildingId) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            building_id,
            phones: Vec::new(),
            activity_ids: Vec::new(),
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phones.push(phone.into());
        self
    }

    pub fn with_activity(mut self, activity_id: ActivityId) -> Self {
        self.activity_ids.push(activity_id);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        ensure_not_blank(&self.name, "name")?;
        for phone in &self.phones {
            ensure_not_blank(phone, "phone")?;
        }
        Ok(())
    }
}
