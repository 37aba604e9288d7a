//! Activity taxonomy closure.
//!
//! # Responsibility
//! - Resolve "this activity or any of its descendants" for a root id.
//! - Derive activity level from ancestry on demand.
//!
//! # Invariants
//! - Each node is visited at most once; termination never depends on the
//!   stored parent graph being acyclic.
//! - Walks deeper than `max_depth` hops fail with `TooDeep`.
//! - A node reached twice from one root means the parent graph has a cycle,
//!   which also fails with `TooDeep`.

use crate::config::DEFAULT_MAX_TAXONOMY_DEPTH;
use crate::model::activity::{ActivityId, ROOT_LEVEL};
use crate::store::{ActivityLookup, StoreError};
use log::warn;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod table;

pub use table::ActivityTable;

pub type TaxonomyResult<T> = Result<T, TaxonomyError>;

#[derive(Debug)]
pub enum TaxonomyError {
    /// Root (or an ancestor during level derivation) does not exist.
    NotFound(ActivityId),
    /// Walk exceeded the depth cap or revisited a node.
    TooDeep {
        root_id: ActivityId,
        max_depth: usize,
        /// First node reached twice, when the walk hit a cycle.
        cycle_at: Option<ActivityId>,
    },
    Store(StoreError),
}

impl Display for TaxonomyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "activity not found: {id}"),
            Self::TooDeep {
                root_id,
                cycle_at: Some(node),
                ..
            } => write!(
                f,
                "activity taxonomy from {root_id} contains a cycle through {node}"
            ),
            Self::TooDeep {
                root_id,
                max_depth,
                cycle_at: None,
            } => write!(
                f,
                "activity taxonomy from {root_id} is deeper than {max_depth} levels"
            ),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TaxonomyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for TaxonomyError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Bounded traversal over an [`ActivityLookup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityTaxonomy {
    max_depth: usize,
}

impl Default for ActivityTaxonomy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TAXONOMY_DEPTH)
    }
}

impl ActivityTaxonomy {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Returns `root_id` plus every activity reachable through child links.
    ///
    /// The set is unordered; sort by id when deterministic output is needed.
    ///
    /// # Errors
    /// - `NotFound` when `root_id` does not exist.
    /// - `TooDeep` on a cycle or when descendants sit more than `max_depth`
    ///   hops below the root.
    pub fn descendants<L>(&self, lookup: &L, root_id: ActivityId) -> TaxonomyResult<HashSet<ActivityId>>
    where
        L: ActivityLookup + ?Sized,
    {
        if lookup.activity_by_id(root_id)?.is_none() {
            return Err(TaxonomyError::NotFound(root_id));
        }

        let mut visited = HashSet::from([root_id]);
        let mut frontier = vec![root_id];
        let mut depth = 0usize;

        while !frontier.is_empty() {
            let mut next = Vec::new();
            for parent_id in &frontier {
                for child_id in lookup.child_activity_ids(*parent_id)? {
                    if !visited.insert(child_id) {
                        warn!(
                            "event=taxonomy_cycle module=taxonomy status=error root_id={} node_id={}",
                            root_id, child_id
                        );
                        return Err(self.too_deep(root_id, Some(child_id)));
                    }
                    next.push(child_id);
                }
            }

            if next.is_empty() {
                break;
            }
            depth += 1;
            if depth > self.max_depth {
                warn!(
                    "event=taxonomy_depth module=taxonomy status=error root_id={} max_depth={}",
                    root_id, self.max_depth
                );
                return Err(self.too_deep(root_id, None));
            }
            frontier = next;
        }

        Ok(visited)
    }

    /// Derives the level of `id` by counting ancestors (root = 1).
    ///
    /// # Errors
    /// - `NotFound` when `id` or any ancestor on its chain is missing.
    /// - `TooDeep` when the chain loops or exceeds `max_depth` hops.
    pub fn level_of<L>(&self, lookup: &L, id: ActivityId) -> TaxonomyResult<u32>
    where
        L: ActivityLookup + ?Sized,
    {
        let mut seen = HashSet::new();
        let mut cursor = Some(id);
        let mut hops = 0usize;

        while let Some(current) = cursor {
            if !seen.insert(current) {
                return Err(self.too_deep(id, Some(current)));
            }
            let node = lookup
                .activity_by_id(current)?
                .ok_or(TaxonomyError::NotFound(current))?;
            cursor = node.parent_id;
            if cursor.is_some() {
                hops += 1;
                if hops > self.max_depth {
                    return Err(self.too_deep(id, None));
                }
            }
        }

        let hops = u32::try_from(hops).map_err(|_| self.too_deep(id, None))?;
        Ok(ROOT_LEVEL + hops)
    }

    fn too_deep(&self, root_id: ActivityId, cycle_at: Option<ActivityId>) -> TaxonomyError {
        TaxonomyError::TooDeep {
            root_id,
            max_depth: self.max_depth,
            cycle_at,
        }
    }
}
