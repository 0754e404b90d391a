//! Read-side projections: flat paged listings and nested tree views.

mod query;
mod tree;

pub use query::{
    PagedList, SortDirection, TaxonListItem, TaxonQuery, TaxonSortField, DEFAULT_PAGE_SIZE,
    MAX_PAGE_SIZE,
};
pub use tree::{
    build_tree, Breadcrumb, TaxonSummary, TaxonTreeNode, TreeQuery, TreeResponse, MAX_TREE_DEPTH,
};
