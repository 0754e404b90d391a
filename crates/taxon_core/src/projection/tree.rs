//! Nested tree projection with optional focus.
//!
//! The forest is assembled from `parent_id` links through an id → index map
//! (O(n)); derived fields are only copied into the output, never trusted for
//! structure.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TaxonomyError;
use crate::types::Taxon;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeQuery {
    pub taxonomy_id: Uuid,
    /// Taxon to focus: its ancestors become breadcrumbs and its subtree is
    /// returned separately.
    #[serde(default)]
    pub focus: Option<Uuid>,
    /// Levels of `tree` to render below the roots (0 = roots only).
    /// Does not prune `focused_subtree`.
    #[serde(default)]
    pub max_depth: Option<u32>,
}

/// Nesting cap for tree responses, applied even when the query sets no
/// `max_depth`. Deeper taxa are still listed by the flat projection.
pub const MAX_TREE_DEPTH: u32 = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonTreeNode {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub pretty_name: String,
    pub position: i32,
    pub depth: u32,
    pub children: Vec<TaxonTreeNode>,
}

impl TaxonTreeNode {
    /// This node plus all descendants.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TaxonTreeNode::size).sum::<usize>()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

impl From<&Taxon> for Breadcrumb {
    fn from(t: &Taxon) -> Self {
        Self {
            id: t.id,
            name: t.name.clone(),
            slug: t.slug.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonSummary {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub pretty_name: String,
    pub depth: u32,
}

impl From<&Taxon> for TaxonSummary {
    fn from(t: &Taxon) -> Self {
        Self {
            id: t.id,
            parent_id: t.parent_id,
            name: t.name.clone(),
            slug: t.slug.clone(),
            pretty_name: t.pretty_name.clone(),
            depth: t.depth,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeResponse {
    pub tree: Vec<TaxonTreeNode>,
    /// Root first, focused taxon last. Empty without focus.
    pub breadcrumbs: Vec<Breadcrumb>,
    pub focused_node: Option<TaxonSummary>,
    pub focused_subtree: Option<TaxonTreeNode>,
}

struct Forest<'a> {
    taxa: &'a [Taxon],
    index: HashMap<Uuid, usize>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
}

impl<'a> Forest<'a> {
    fn new(taxa: &'a [Taxon]) -> Self {
        let index: HashMap<Uuid, usize> =
            taxa.iter().enumerate().map(|(i, t)| (t.id, i)).collect();
        let mut children = vec![Vec::new(); taxa.len()];
        let mut roots = Vec::new();

        for (i, taxon) in taxa.iter().enumerate() {
            match taxon.parent_id.and_then(|p| index.get(&p)) {
                Some(&p) => children[p].push(i),
                // Orphans surface as roots rather than vanish.
                None => roots.push(i),
            }
        }

        let order = |a: &usize, b: &usize| {
            taxa[*a]
                .position
                .cmp(&taxa[*b].position)
                .then_with(|| taxa[*a].name.cmp(&taxa[*b].name))
        };
        roots.sort_by(order);
        for list in &mut children {
            list.sort_by(order);
        }

        Self {
            taxa,
            index,
            children,
            roots,
        }
    }

    fn leaf(&self, i: usize) -> TaxonTreeNode {
        let t = &self.taxa[i];
        TaxonTreeNode {
            id: t.id,
            name: t.name.clone(),
            slug: t.slug.clone(),
            pretty_name: t.pretty_name.clone(),
            position: t.position,
            depth: t.depth,
            children: Vec::new(),
        }
    }

    /// Subtree under `start`, at most `max_depth` levels below it. Walks with
    /// an explicit stack so a long chain cannot exhaust the call stack.
    fn node(&self, start: usize, max_depth: u32, seen: &mut HashSet<usize>) -> TaxonTreeNode {
        // Pre-order slots: (taxon index, slot of its parent).
        let mut order: Vec<(usize, usize)> = Vec::new();
        let mut stack = vec![(start, max_depth, 0)];
        seen.insert(start);
        while let Some((i, remaining, parent)) = stack.pop() {
            let slot = order.len();
            order.push((i, parent));
            if remaining == 0 {
                continue;
            }
            for &c in self.children[i].iter().rev() {
                if seen.insert(c) {
                    stack.push((c, remaining - 1, slot));
                }
            }
        }

        // Children always sit in later slots than their parent, so folding
        // from the back finishes every subtree before it is attached.
        let mut built: Vec<TaxonTreeNode> = order.iter().map(|&(i, _)| self.leaf(i)).collect();
        while built.len() > 1 {
            let slot = built.len() - 1;
            let mut node = built.remove(slot);
            node.children.reverse();
            built[order[slot].1].children.push(node);
        }
        let mut root = built.remove(0);
        root.children.reverse();
        root
    }

    fn breadcrumbs(&self, focus: usize) -> Vec<Breadcrumb> {
        let mut chain = vec![focus];
        let mut seen: HashSet<usize> = HashSet::from([focus]);
        let mut cursor = self.taxa[focus].parent_id;
        while let Some(&p) = cursor.and_then(|id| self.index.get(&id)) {
            if !seen.insert(p) {
                break;
            }
            chain.push(p);
            cursor = self.taxa[p].parent_id;
        }
        chain
            .into_iter()
            .rev()
            .map(|i| Breadcrumb::from(&self.taxa[i]))
            .collect()
    }
}

/// Build the tree view for `taxa` (all taxa of one taxonomy).
///
/// Fails with `NotFound` when `query.focus` is not among `taxa`.
pub fn build_tree(taxa: &[Taxon], query: &TreeQuery) -> Result<TreeResponse, TaxonomyError> {
    let forest = Forest::new(taxa);
    let max_depth = query.max_depth.map_or(MAX_TREE_DEPTH, |d| d.min(MAX_TREE_DEPTH));

    let mut seen = HashSet::new();
    let tree = forest
        .roots
        .iter()
        .map(|&r| forest.node(r, max_depth, &mut seen))
        .collect();

    let Some(focus_id) = query.focus else {
        return Ok(TreeResponse {
            tree,
            breadcrumbs: Vec::new(),
            focused_node: None,
            focused_subtree: None,
        });
    };

    let &focus = forest
        .index
        .get(&focus_id)
        .ok_or_else(|| TaxonomyError::not_found("taxon", focus_id))?;

    Ok(TreeResponse {
        tree,
        breadcrumbs: forest.breadcrumbs(focus),
        focused_node: Some(TaxonSummary::from(&taxa[focus])),
        focused_subtree: Some(forest.node(focus, MAX_TREE_DEPTH, &mut HashSet::new())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::{fixtures::taxon, rebuild};

    fn catalog() -> Vec<Taxon> {
        let taxonomy_id = Uuid::new_v4();
        let root = taxon(taxonomy_id, None, "Catalog", 0);
        let clothing = taxon(taxonomy_id, Some(root.id), "Clothing", 0);
        let books = taxon(taxonomy_id, Some(root.id), "Books", 1);
        let shirts = taxon(taxonomy_id, Some(clothing.id), "Shirts", 0);
        let pants = taxon(taxonomy_id, Some(clothing.id), "Pants", 1);
        rebuild(vec![root, clothing, books, shirts, pants]).taxa
    }

    #[test]
    fn builds_nested_forest_in_position_order() {
        let taxa = catalog();
        let resp = build_tree(
            &taxa,
            &TreeQuery {
                taxonomy_id: taxa[0].taxonomy_id,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(resp.tree.len(), 1);
        let root = &resp.tree[0];
        assert_eq!(root.size(), 5);
        let names: Vec<&str> = root.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Clothing", "Books"]);
        assert!(resp.breadcrumbs.is_empty());
        assert!(resp.focused_subtree.is_none());
    }

    #[test]
    fn focus_returns_breadcrumbs_and_subtree() {
        let taxa = catalog();
        let clothing = taxa[1].id;
        let shirts = taxa[3].id;

        let resp = build_tree(
            &taxa,
            &TreeQuery {
                taxonomy_id: taxa[0].taxonomy_id,
                focus: Some(shirts),
                max_depth: None,
            },
        )
        .unwrap();
        let crumbs: Vec<&str> = resp.breadcrumbs.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(crumbs, vec!["Catalog", "Clothing", "Shirts"]);
        assert_eq!(resp.focused_node.unwrap().id, shirts);

        let resp = build_tree(
            &taxa,
            &TreeQuery {
                taxonomy_id: taxa[0].taxonomy_id,
                focus: Some(clothing),
                max_depth: None,
            },
        )
        .unwrap();
        assert_eq!(resp.focused_subtree.unwrap().size(), 3);
    }

    #[test]
    fn max_depth_prunes_tree_only() {
        let taxa = catalog();
        let resp = build_tree(
            &taxa,
            &TreeQuery {
                taxonomy_id: taxa[0].taxonomy_id,
                focus: Some(taxa[0].id),
                max_depth: Some(1),
            },
        )
        .unwrap();
        assert_eq!(resp.tree[0].size(), 3);
        assert_eq!(resp.focused_subtree.unwrap().size(), 5);
    }

    #[test]
    fn unknown_focus_is_not_found() {
        let taxa = catalog();
        let err = build_tree(
            &taxa,
            &TreeQuery {
                taxonomy_id: taxa[0].taxonomy_id,
                focus: Some(Uuid::new_v4()),
                max_depth: None,
            },
        )
        .unwrap_err();
        assert_eq!(err.http_status(), 404);
    }

    #[test]
    fn long_chain_is_capped_without_recursing() {
        let taxonomy_id = Uuid::new_v4();
        let mut taxa = vec![taxon(taxonomy_id, None, "Root", 0)];
        for n in 1..5_000 {
            let parent = taxa[n - 1].id;
            taxa.push(taxon(taxonomy_id, Some(parent), &format!("Level {n}"), 0));
        }
        let deepest = taxa[4_999].id;

        let resp = build_tree(
            &taxa,
            &TreeQuery {
                taxonomy_id,
                focus: Some(deepest),
                max_depth: None,
            },
        )
        .unwrap();

        let mut levels = 1;
        let mut cursor = &resp.tree[0];
        while let Some(next) = cursor.children.first() {
            levels += 1;
            cursor = next;
        }
        assert_eq!(levels, MAX_TREE_DEPTH as usize + 1);
        assert_eq!(resp.breadcrumbs.len(), 5_000);
        assert!(resp.focused_subtree.unwrap().children.is_empty());
    }
}
