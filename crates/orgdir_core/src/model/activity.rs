//! Activity taxonomy node.
//!
//! Nodes are stored flat with an explicit `parent_id`; children are resolved by
//! lookup, never through owning pointers.

use crate::model::{ensure_not_blank, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ActivityId = Uuid;

/// Level assigned to taxonomy roots.
pub const ROOT_LEVEL: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub name: String,
    pub parent_id: Option<ActivityId>,
    /// Depth from the nearest root (root = 1).
    pub level: u32,
}

impl Activity {
    /// Creates a root activity.
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            parent_id: None,
            level: ROOT_LEVEL,
        }
    }

    /// Creates a child of `parent`, one level deeper.
    pub fn child_of(parent: &Activity, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            parent_id: Some(parent.id),
            level: parent.level.saturating_add(1),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Checks local invariants. Ancestry consistency is checked by the taxonomy.
    pub fn validate(&self) -> Result<(), ValidationError> {
        ensure_not_blank(&self.name, "name")?;
        if self.parent_id == Some(self.id) {
            return Err(ValidationError::SelfParentedActivity);
        }

        let level_ok = if self.is_root() {
            self.level == ROOT_LEVEL
        } else {
            self.level > ROOT_LEVEL
        };
        if !level_ok {
            return Err(ValidationError::InvalidActivityLevel {
                level: self.level,
                has_parent: self.parent_id.is_some(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Activity, ROOT_LEVEL};
    use crate::model::ValidationError;

    #[test]
    fn child_is_one_level_below_parent() {
        let root = Activity::root("IT");
        let child = Activity::child_of(&root, "Software");
        assert_eq!(root.level, ROOT_LEVEL);
        assert_eq!(child.level, 2);
        assert_eq!(child.parent_id, Some(root.id));
        assert!(child.validate().is_ok());
    }

    #[test]
    fn root_with_wrong_level_is_rejected() {
        let mut root = Activity::root("Food");
        root.level = 3;
        assert_eq!(
            root.validate().unwrap_err(),
            ValidationError::InvalidActivityLevel {
                level: 3,
                has_parent: false
            }
        );
    }

    #[test]
    fn self_parent_is_rejected() {
        let mut node = Activity::root("Loop");
        node.parent_id = Some(node.id);
        node.level = 2;
        assert_eq!(
            node.validate().unwrap_err(),
            ValidationError::SelfParentedActivity
        );
    }
}
