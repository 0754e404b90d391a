use std::collections::HashSet;

use uuid::Uuid;

use crate::types::Taxon;

/// Ids of the direct children of `parent_id`.
pub fn children_of(taxa: &[Taxon], parent_id: Uuid) -> Vec<Uuid> {
    taxa.iter()
        .filter(|t| t.parent_id == Some(parent_id))
        .map(|t| t.id)
        .collect()
}

/// Ancestor ids of `id` walking parent links, nearest first.
///
/// Follows `parent_id` rather than `materialized_path` so it is correct on a
/// tree whose derived fields are stale. Stops on a repeated id, so a cyclic
/// input terminates.
pub fn ancestors_of(taxa: &[Taxon], id: Uuid) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut cursor = taxa.iter().find(|t| t.id == id).and_then(|t| t.parent_id);
    while let Some(parent_id) = cursor {
        if !seen.insert(parent_id) {
            break;
        }
        out.push(parent_id);
        cursor = taxa
            .iter()
            .find(|t| t.id == parent_id)
            .and_then(|t| t.parent_id);
    }
    out
}

/// Put `id` into slot `position` among the children of its current parent
/// and renumber that sibling group `0..n`.
///
/// `None` (or a slot past the end) appends. The other siblings keep their
/// relative order.
pub fn place_among_siblings(taxa: &mut [Taxon], id: Uuid, position: Option<i32>) {
    let Some(parent_id) = taxa.iter().find(|t| t.id == id).map(|t| t.parent_id) else {
        return;
    };

    let mut siblings: Vec<usize> = taxa
        .iter()
        .enumerate()
        .filter(|(_, t)| t.parent_id == parent_id && t.id != id)
        .map(|(i, _)| i)
        .collect();
    siblings.sort_by(|&a, &b| {
        taxa[a]
            .position
            .cmp(&taxa[b].position)
            .then_with(|| taxa[a].name.cmp(&taxa[b].name))
            .then_with(|| taxa[a].id.cmp(&taxa[b].id))
    });

    let slot = position
        .map(|p| (p.max(0) as usize).min(siblings.len()))
        .unwrap_or(siblings.len());
    let Some(me) = taxa.iter().position(|t| t.id == id) else {
        return;
    };
    siblings.insert(slot, me);

    for (n, &i) in siblings.iter().enumerate() {
        taxa[i].position = n as i32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::fixtures::{chain, taxon};

    #[test]
    fn ancestors_follow_parent_links() {
        let (_, taxa) = chain();
        assert_eq!(ancestors_of(&taxa, taxa[2].id), vec![taxa[1].id, taxa[0].id]);
        assert!(ancestors_of(&taxa, taxa[0].id).is_empty());
    }

    #[test]
    fn ancestors_terminate_on_cycle() {
        let (_, mut taxa) = chain();
        taxa[0].parent_id = Some(taxa[2].id);
        let up = ancestors_of(&taxa, taxa[2].id);
        assert_eq!(up.len(), 3);
    }

    #[test]
    fn place_inserts_and_renumbers() {
        let (taxonomy_id, mut taxa) = chain();
        let a = taxa[0].id;
        let x = taxon(taxonomy_id, Some(a), "X", 0);
        let y = taxon(taxonomy_id, Some(a), "Y", 1);
        let new = taxon(taxonomy_id, Some(a), "New", 99);
        let (x_id, y_id, new_id) = (x.id, y.id, new.id);
        // B is already at 0 under A; X collides with it and sorts after by name.
        taxa.extend([x, y, new]);

        place_among_siblings(&mut taxa, new_id, Some(1));

        let pos = |id: Uuid| taxa.iter().find(|t| t.id == id).unwrap().position;
        assert_eq!(pos(taxa[1].id), 0);
        assert_eq!(pos(new_id), 1);
        assert_eq!(pos(x_id), 2);
        assert_eq!(pos(y_id), 3);
    }

    #[test]
    fn place_appends_when_unspecified() {
        let (taxonomy_id, mut taxa) = chain();
        let a = taxa[0].id;
        let new = taxon(taxonomy_id, Some(a), "New", 0);
        let new_id = new.id;
        taxa.push(new);
        place_among_siblings(&mut taxa, new_id, None);
        let placed = taxa.iter().find(|t| t.id == new_id).unwrap();
        assert_eq!(placed.position, 1);
        assert_eq!(children_of(&taxa, a).len(), 2);
    }
}
