//! Directory domain model.
//!
//! # Responsibility
//! - Define buildings, activities, organizations and phones.
//! - Validate entity invariants before persistence and after reads.
//!
//! # Invariants
//! - Every entity is identified by a stable UUID.
//! - Activities form a forest through `parent_id`; roots have `level == 1`.
//! - Organizations own their phones; activity links are non-owning.

use crate::geo::projection::GeoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod activity;
pub mod building;
pub mod organization;

/// Entity invariant violations.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Building location is outside WGS84 ranges.
    InvalidLocation(GeoError),
    /// A required text field is blank after trim.
    BlankField(&'static str),
    /// Activity level is inconsistent with its parent link.
    InvalidActivityLevel { level: u32, has_parent: bool },
    /// Activity lists itself as parent.
    SelfParentedActivity,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLocation(err) => write!(f, "{err}"),
            Self::BlankField(field) => write!(f, "`{field}` must not be blank"),
            Self::InvalidActivityLevel { level, has_parent } => {
                if *has_parent {
                    write!(f, "child activity level must be at least 2, got {level}")
                } else {
                    write!(f, "root activity level must be 1, got {level}")
                }
            }
            Self::SelfParentedActivity => write!(f, "activity cannot be its own parent"),
        }
    }
}

impl Error for ValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidLocation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<GeoError> for ValidationError {
    fn from(value: GeoError) -> Self {
        Self::InvalidLocation(value)
    }
}

pub(crate) fn ensure_not_blank(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::BlankField(field));
    }
    Ok(())
}
