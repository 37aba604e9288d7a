//! Flat in-memory activity table.
//!
//! Nodes are keyed by id with an explicit `parent_id`; the child index is
//! derived from those links and rebuilt on every insert.

use crate::model::activity::{Activity, ActivityId};
use crate::store::{ActivityLookup, StoreResult};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityTable {
    nodes: BTreeMap<ActivityId, Activity>,
    children: BTreeMap<ActivityId, BTreeSet<ActivityId>>,
}

impl ActivityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from rows as stored, without validating ancestry.
    pub fn from_nodes(nodes: impl IntoIterator<Item = Activity>) -> Self {
        let mut table = Self::new();
        for node in nodes {
            table.insert(node);
        }
        table
    }

    /// Inserts or replaces one node, keeping the child index in sync.
    pub fn insert(&mut self, activity: Activity) {
        if let Some(previous) = self.nodes.get(&activity.id) {
            if let Some(old_parent) = previous.parent_id {
                if let Some(siblings) = self.children.get_mut(&old_parent) {
                    siblings.remove(&activity.id);
                }
            }
        }
        if let Some(parent_id) = activity.parent_id {
            self.children
                .entry(parent_id)
                .or_default()
                .insert(activity.id);
        }
        self.nodes.insert(activity.id, activity);
    }

    pub fn get(&self, id: ActivityId) -> Option<&Activity> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: ActivityId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Direct children of `parent_id`, ordered by id.
    pub fn children_of(&self, parent_id: ActivityId) -> impl Iterator<Item = ActivityId> + '_ {
        self.children
            .get(&parent_id)
            .into_iter()
            .flat_map(|ids| ids.iter().copied())
    }
}

impl ActivityLookup for ActivityTable {
    fn activity_by_id(&self, id: ActivityId) -> StoreResult<Option<Activity>> {
        Ok(self.get(id).cloned())
    }

    fn child_activity_ids(&self, parent_id: ActivityId) -> StoreResult<Vec<ActivityId>> {
        Ok(self.children_of(parent_id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::ActivityTable;
    use crate::model::activity::Activity;

    #[test]
    fn reparenting_moves_child_index_entry() {
        let first = Activity::root("First");
        let second = Activity::root("Second");
        let mut leaf = Activity::child_of(&first, "Leaf");
        let mut table = ActivityTable::from_nodes([first.clone(), second.clone(), leaf.clone()]);
        assert_eq!(table.children_of(first.id).collect::<Vec<_>>(), vec![leaf.id]);

        leaf.parent_id = Some(second.id);
        table.insert(leaf.clone());

        assert_eq!(table.children_of(first.id).count(), 0);
        assert_eq!(table.children_of(second.id).collect::<Vec<_>>(), vec![leaf.id]);
        assert_eq!(table.len(), 3);
    }
}
