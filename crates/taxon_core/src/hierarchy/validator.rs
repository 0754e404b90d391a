use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Violation;
use crate::types::Taxon;

/// Optional structural limits on top of the forest invariants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyLimits {
    /// Deepest allowed depth (root = 0). `None` disables the check.
    pub max_depth: Option<u32>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    White,
    Gray,
    Black,
}

/// Check the parent graph of one taxonomy's taxa.
///
/// Pass 1 rejects any `parent_id` that is not a member of `taxa`. Pass 2
/// colours nodes white/gray/black while walking each parent chain; meeting a
/// gray node means the chain closed on itself. The walk also yields every
/// node's true depth for the optional depth limit.
///
/// Returns the first violation found. Never repairs anything.
pub fn validate(taxa: &[Taxon], limits: &HierarchyLimits) -> Result<(), Violation> {
    let index: HashMap<Uuid, usize> = taxa.iter().enumerate().map(|(i, t)| (t.id, i)).collect();

    for taxon in taxa {
        if let Some(parent_id) = taxon.parent_id {
            match index.get(&parent_id) {
                Some(&p) if taxa[p].taxonomy_id == taxon.taxonomy_id => {}
                _ => return Err(Violation::invalid_parent(taxon.id, parent_id)),
            }
        }
    }

    let parent_of = |i: usize| taxa[i].parent_id.and_then(|p| index.get(&p).copied());

    let mut marks = vec![Mark::White; taxa.len()];
    let mut depths = vec![0u32; taxa.len()];
    let mut trail: Vec<usize> = Vec::new();

    for start in 0..taxa.len() {
        if marks[start] != Mark::White {
            continue;
        }
        trail.clear();
        let mut cursor = Some(start);
        let mut base: Option<u32> = None;

        while let Some(i) = cursor {
            match marks[i] {
                Mark::Gray => {
                    let from = trail.iter().position(|&j| j == i).unwrap_or(0);
                    let members: Vec<Uuid> = trail[from..].iter().map(|&j| taxa[j].id).collect();
                    return Err(Violation::cycle(&members));
                }
                Mark::Black => {
                    base = Some(depths[i] + 1);
                    break;
                }
                Mark::White => {
                    marks[i] = Mark::Gray;
                    trail.push(i);
                    cursor = parent_of(i);
                }
            }
        }

        // `trail` runs child -> ancestor; assign depths from the top down.
        let mut depth = base.unwrap_or(0);
        for &i in trail.iter().rev() {
            depths[i] = depth;
            marks[i] = Mark::Black;
            if let Some(max) = limits.max_depth {
                if depth > max {
                    return Err(Violation::depth_exceeded(taxa[i].id, depth, max));
                }
            }
            depth += 1;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::codes;
    use crate::hierarchy::fixtures::{chain, taxon};

    #[test]
    fn valid_chain_passes() {
        let (_, taxa) = chain();
        assert!(validate(&taxa, &HierarchyLimits::default()).is_ok());
    }

    #[test]
    fn empty_taxonomy_passes() {
        assert!(validate(&[], &HierarchyLimits::default()).is_ok());
    }

    #[test]
    fn cycle_is_reported_with_members() {
        let (_, mut taxa) = chain();
        // A.parent = C closes A -> B -> C -> A
        taxa[0].parent_id = Some(taxa[2].id);
        let v = validate(&taxa, &HierarchyLimits::default()).unwrap_err();
        assert_eq!(v.code, codes::HIERARCHY_CYCLE);
        for t in &taxa {
            assert!(v.message.contains(&t.id.to_string()));
        }
    }

    #[test]
    fn self_parent_is_a_cycle() {
        let (_, mut taxa) = chain();
        taxa[1].parent_id = Some(taxa[1].id);
        let v = validate(&taxa, &HierarchyLimits::default()).unwrap_err();
        assert_eq!(v.code, codes::HIERARCHY_CYCLE);
        assert_eq!(v.taxon_id, Some(taxa[1].id));
    }

    #[test]
    fn missing_parent_is_invalid() {
        let (_, mut taxa) = chain();
        let ghost = Uuid::new_v4();
        taxa[2].parent_id = Some(ghost);
        let v = validate(&taxa, &HierarchyLimits::default()).unwrap_err();
        assert_eq!(v.code, codes::HIERARCHY_INVALID_PARENT);
        assert_eq!(v.taxon_id, Some(taxa[2].id));
    }

    #[test]
    fn foreign_parent_is_invalid() {
        let (_, mut taxa) = chain();
        let other = taxon(Uuid::new_v4(), None, "Other", 0);
        taxa[1].parent_id = Some(other.id);
        taxa.push(other);
        let v = validate(&taxa, &HierarchyLimits::default()).unwrap_err();
        assert_eq!(v.code, codes::HIERARCHY_INVALID_PARENT);
    }

    #[test]
    fn depth_limit_applies_to_true_depth() {
        let (_, taxa) = chain();
        let limits = HierarchyLimits { max_depth: Some(1) };
        let v = validate(&taxa, &limits).unwrap_err();
        assert_eq!(v.code, codes::HIERARCHY_DEPTH_EXCEEDED);
        assert_eq!(v.taxon_id, Some(taxa[2].id));

        let limits = HierarchyLimits { max_depth: Some(2) };
        assert!(validate(&taxa, &limits).is_ok());
    }

    #[test]
    fn depth_limit_when_walk_starts_at_leaf() {
        let (_, mut taxa) = chain();
        taxa.reverse();
        let limits = HierarchyLimits { max_depth: Some(1) };
        let v = validate(&taxa, &limits).unwrap_err();
        assert_eq!(v.code, codes::HIERARCHY_DEPTH_EXCEEDED);
    }
}
