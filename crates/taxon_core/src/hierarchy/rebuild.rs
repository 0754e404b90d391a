use std::collections::{HashMap, VecDeque};

use uuid::Uuid;

use crate::types::Taxon;

/// Separator between ancestor names in `pretty_name`.
pub const PRETTY_NAME_SEPARATOR: &str = " -> ";

#[derive(Debug, Clone)]
pub struct RebuildOutcome {
    /// The input taxa with derived fields recomputed, in input order.
    pub taxa: Vec<Taxon>,
    /// Taxa reached from a root. Less than `taxa.len()` only when the
    /// input was not validated first.
    pub visited: usize,
}

/// Recompute `depth`, `materialized_path`, `pretty_name` and sibling
/// `position` for every taxon reachable from a root.
///
/// Breadth-first from each root; siblings are visited in
/// `(position, name, id)` order and renumbered `0..n` in that order, so the
/// result is a fixed point: rebuilding it again changes nothing.
///
/// Callers must run [`super::validate`] first; nodes on a cycle are never
/// reached and keep their stale values.
pub fn rebuild(mut taxa: Vec<Taxon>) -> RebuildOutcome {
    let index: HashMap<Uuid, usize> = taxa.iter().enumerate().map(|(i, t)| (t.id, i)).collect();

    let mut children: HashMap<Uuid, Vec<usize>> = HashMap::new();
    let mut roots: Vec<usize> = Vec::new();
    for (i, taxon) in taxa.iter().enumerate() {
        match taxon.parent_id {
            Some(parent_id) if index.contains_key(&parent_id) => {
                children.entry(parent_id).or_default().push(i)
            }
            Some(_) => {}
            None => roots.push(i),
        }
    }

    let sibling_order = |a: &usize, b: &usize| {
        let (x, y) = (&taxa[*a], &taxa[*b]);
        x.position
            .cmp(&y.position)
            .then_with(|| x.name.cmp(&y.name))
            .then_with(|| x.id.cmp(&y.id))
    };
    roots.sort_by(sibling_order);
    for list in children.values_mut() {
        list.sort_by(sibling_order);
    }

    let mut queue: VecDeque<usize> = VecDeque::new();
    for (slot, &i) in roots.iter().enumerate() {
        let root = &mut taxa[i];
        root.depth = 0;
        root.materialized_path = vec![root.id];
        root.pretty_name = root.name.clone();
        root.position = slot as i32;
        queue.push_back(i);
    }

    let mut visited = 0;
    while let Some(i) = queue.pop_front() {
        visited += 1;
        let Some(kids) = children.get(&taxa[i].id) else {
            continue;
        };
        let depth = taxa[i].depth + 1;
        let path = taxa[i].materialized_path.clone();
        let pretty = taxa[i].pretty_name.clone();

        for (slot, &k) in kids.iter().enumerate() {
            let child = &mut taxa[k];
            child.depth = depth;
            child.materialized_path = path.clone();
            child.materialized_path.push(child.id);
            child.pretty_name = format!("{pretty}{PRETTY_NAME_SEPARATOR}{}", child.name);
            child.position = slot as i32;
            queue.push_back(k);
        }
    }

    RebuildOutcome { taxa, visited }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::fixtures::{chain, taxon};

    fn by_id(taxa: &[Taxon], id: Uuid) -> &Taxon {
        taxa.iter().find(|t| t.id == id).unwrap()
    }

    #[test]
    fn chain_gets_paths_and_depths() {
        let (_, taxa) = chain();
        let (a, b, c) = (taxa[0].id, taxa[1].id, taxa[2].id);
        let out = rebuild(taxa);
        assert_eq!(out.visited, 3);
        assert_eq!(by_id(&out.taxa, a).materialized_path, vec![a]);
        assert_eq!(by_id(&out.taxa, b).materialized_path, vec![a, b]);
        assert_eq!(by_id(&out.taxa, c).materialized_path, vec![a, b, c]);
        assert_eq!(by_id(&out.taxa, c).depth, 2);
        assert_eq!(by_id(&out.taxa, c).pretty_name, "A -> B -> C");
    }

    #[test]
    fn reparent_then_rebuild() {
        let (_, mut taxa) = chain();
        let (a, c) = (taxa[0].id, taxa[2].id);
        taxa[2].parent_id = Some(a);
        let out = rebuild(taxa);
        let c = by_id(&out.taxa, c);
        assert_eq!(c.depth, 1);
        assert_eq!(c.materialized_path, vec![a, c.id]);
    }

    #[test]
    fn sibling_positions_are_normalised() {
        let (taxonomy_id, mut taxa) = chain();
        let a = taxa[0].id;
        taxa.push(taxon(taxonomy_id, Some(a), "Zeta", 7));
        taxa.push(taxon(taxonomy_id, Some(a), "Alpha", 7));
        let out = rebuild(taxa);
        let mut siblings: Vec<&Taxon> = out
            .taxa
            .iter()
            .filter(|t| t.parent_id == Some(a))
            .collect();
        siblings.sort_by_key(|t| t.position);
        let names: Vec<&str> = siblings.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["B", "Alpha", "Zeta"]);
        let positions: Vec<i32> = siblings.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn rebuild_is_a_fixed_point() {
        let (_, taxa) = chain();
        let once = rebuild(taxa).taxa;
        let twice = rebuild(once.clone()).taxa;
        assert_eq!(once, twice);
    }

    #[test]
    fn cycle_members_are_not_visited() {
        let (_, mut taxa) = chain();
        taxa[0].parent_id = Some(taxa[2].id);
        let out = rebuild(taxa);
        assert_eq!(out.visited, 0);
    }
}
