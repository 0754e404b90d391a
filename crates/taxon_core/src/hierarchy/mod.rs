//! Hierarchy maintenance over an arena of taxa.
//!
//! Everything here is pure: functions take the taxa of one taxonomy as a
//! slice/`Vec` keyed by `Uuid` and never touch storage. Stores run these
//! inside their transaction via [`crate::ports::TaxonomyStore::apply_hierarchy_transform`].

mod edit;
mod rebuild;
mod validator;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Taxon;

pub use edit::{ancestors_of, children_of, place_among_siblings};
pub use rebuild::{rebuild, RebuildOutcome};
pub use validator::{validate, HierarchyLimits};

/// Rows a structural edit writes back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HierarchyChangeSet {
    pub inserts: Vec<Taxon>,
    pub updates: Vec<Taxon>,
    pub deletions: Vec<Uuid>,
    /// Number of taxa the rebuild traversal reached.
    pub visited: usize,
}

impl HierarchyChangeSet {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletions.is_empty()
    }

    /// Compute the change set turning `before` into `after`.
    ///
    /// Updated rows get `updated_at` bumped to `now`; untouched rows are
    /// omitted so an idempotent rebuild writes nothing.
    pub fn diff(
        before: &[Taxon],
        after: Vec<Taxon>,
        visited: usize,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        let previous: HashMap<Uuid, &Taxon> = before.iter().map(|t| (t.id, t)).collect();
        let mut set = Self {
            visited,
            ..Self::default()
        };

        let mut kept = std::collections::HashSet::with_capacity(after.len());
        for mut taxon in after {
            kept.insert(taxon.id);
            match previous.get(&taxon.id) {
                None => set.inserts.push(taxon),
                Some(old) if **old != taxon => {
                    taxon.updated_at = now;
                    set.updates.push(taxon);
                }
                Some(_) => {}
            }
        }
        set.deletions = before
            .iter()
            .filter(|t| !kept.contains(&t.id))
            .map(|t| t.id)
            .collect();
        set
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::Utc;
    use uuid::Uuid;

    use crate::types::{MatchPolicy, Taxon};

    /// A bare taxon with derived fields deliberately left stale.
    pub fn taxon(taxonomy_id: Uuid, parent_id: Option<Uuid>, name: &str, position: i32) -> Taxon {
        let now = Utc::now();
        Taxon {
            id: Uuid::new_v4(),
            taxonomy_id,
            parent_id,
            name: name.to_string(),
            slug: crate::slug::slugify(name),
            pretty_name: String::new(),
            description: None,
            position,
            materialized_path: Vec::new(),
            depth: 0,
            rules_match_policy: MatchPolicy::All,
            created_at: now,
            updated_at: now,
        }
    }

    /// A(root) -> B -> C
    pub fn chain() -> (Uuid, Vec<Taxon>) {
        let taxonomy_id = Uuid::new_v4();
        let a = taxon(taxonomy_id, None, "A", 0);
        let b = taxon(taxonomy_id, Some(a.id), "B", 0);
        let c = taxon(taxonomy_id, Some(b.id), "C", 0);
        (taxonomy_id, vec![a, b, c])
    }
}
