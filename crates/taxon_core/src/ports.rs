//! Storage port traits.
//! Implemented by `taxon_postgres` and [`crate::memory::MemoryStore`]; core
//! logic depends only on these traits.

use async_trait::async_trait;
use uuid::Uuid;

pub use crate::error::Result;
use crate::hierarchy::HierarchyChangeSet;
use crate::projection::TaxonQuery;
use crate::types::*;

/// Read-modify-write step run by [`TaxonomyStore::apply_hierarchy_transform`].
///
/// Receives every taxon of the taxonomy and returns the rows to insert,
/// update and delete. An `Err` aborts the whole operation with nothing written.
pub type HierarchyTransform<'a> =
    dyn Fn(Vec<Taxon>) -> Result<HierarchyChangeSet> + Send + Sync + 'a;

#[async_trait]
pub trait TaxonomyStore: Send + Sync {
    // ── Taxonomies ─────────────────────────────────────────────

    /// Insert a taxonomy together with its root taxon (one transaction).
    /// Fails with `taxonomy.name_taken` when the name is already in use.
    async fn insert_taxonomy(&self, taxonomy: &Taxonomy, root: &Taxon) -> Result<()>;

    async fn get_taxonomy(&self, id: Uuid) -> Result<Option<Taxonomy>>;

    async fn find_taxonomy_by_name(&self, name: &str) -> Result<Option<Taxonomy>>;

    /// All taxonomies ordered by `(position, name)`.
    async fn list_taxonomies(&self) -> Result<Vec<Taxonomy>>;

    /// Overwrite the taxonomy row and run `transform` over its taxa in one
    /// transaction; either both land or neither does. Fails with `NotFound`
    /// for an unknown taxonomy and `taxonomy.name_taken` when another
    /// taxonomy already holds the name.
    async fn update_taxonomy(
        &self,
        taxonomy: &Taxonomy,
        transform: &HierarchyTransform<'_>,
    ) -> Result<HierarchyChangeSet>;

    /// Delete a taxonomy with all of its taxa, rules and classifications.
    /// Returns `false` when nothing was deleted.
    async fn delete_taxonomy(&self, id: Uuid) -> Result<bool>;

    // ── Taxa ───────────────────────────────────────────────────

    async fn get_taxon(&self, id: Uuid) -> Result<Option<Taxon>>;

    /// First root (parent `None`) of the taxonomy by position.
    async fn get_root(&self, taxonomy_id: Uuid) -> Result<Option<Taxon>>;

    /// All taxa of a taxonomy ordered by `(depth, position, name)`.
    async fn list_taxa(&self, taxonomy_id: Uuid) -> Result<Vec<Taxon>>;

    async fn count_children(&self, parent_id: Uuid) -> Result<usize>;

    /// One page of taxa matching `query` plus the total match count.
    /// `query` is expected to be normalised (page and page size set).
    async fn query_taxa(&self, query: &TaxonQuery) -> Result<(Vec<Taxon>, u64)>;

    /// Load every taxon of `taxonomy_id`, run `transform`, persist its change
    /// set, all inside one transaction. Concurrent readers see either the
    /// prior state or the complete result. Fails with `NotFound` when the
    /// taxonomy does not exist.
    async fn apply_hierarchy_transform(
        &self,
        taxonomy_id: Uuid,
        transform: &HierarchyTransform<'_>,
    ) -> Result<HierarchyChangeSet>;
}

#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn insert_rule(&self, rule: &TaxonRule) -> Result<()>;

    async fn get_rule(&self, id: Uuid) -> Result<Option<TaxonRule>>;

    /// Rules of a taxon in creation order.
    async fn list_rules(&self, taxon_id: Uuid) -> Result<Vec<TaxonRule>>;

    async fn delete_rule(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait ClassificationStore: Send + Sync {
    async fn get_classification(
        &self,
        product_id: Uuid,
        taxon_id: Uuid,
    ) -> Result<Option<Classification>>;

    /// Classifications of a taxon ordered by `(position, created_at)`.
    async fn list_for_taxon(&self, taxon_id: Uuid) -> Result<Vec<Classification>>;

    async fn count_for_taxon(&self, taxon_id: Uuid) -> Result<usize>;

    async fn insert_classification(&self, classification: &Classification) -> Result<()>;

    async fn update_classification(&self, classification: &Classification) -> Result<()>;

    async fn delete_classification(&self, product_id: Uuid, taxon_id: Uuid) -> Result<bool>;

    /// Make the taxon's automatic classifications exactly `product_ids`
    /// (in that order) in one transaction. Manual rows are never touched and
    /// products that already have a manual row are skipped.
    async fn replace_automatic(&self, taxon_id: Uuid, product_ids: &[Uuid])
        -> Result<AutomaticDiff>;
}

/// Product catalog collaborator, read-only from the taxonomy's side.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>>;

    async fn list_products(&self) -> Result<Vec<Product>>;
}
