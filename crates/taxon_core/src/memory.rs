//! In-process implementation of every storage port.
//!
//! All state sits behind one `tokio::sync::RwLock`; a hierarchy transform or
//! an automatic-classification replacement holds the write lock for its whole
//! read-modify-write, which gives the same all-or-nothing visibility as the
//! Postgres transaction. Used by tests and by the server when no database is
//! configured.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::TaxonomyError;
use crate::hierarchy::HierarchyChangeSet;
use crate::ports::{
    ClassificationStore, HierarchyTransform, ProductCatalog, Result, RuleStore, TaxonomyStore,
};
use crate::projection::TaxonQuery;
use crate::regeneration::plan_automatic;
use crate::types::*;

#[derive(Default)]
struct State {
    taxonomies: HashMap<Uuid, Taxonomy>,
    taxa: HashMap<Uuid, Taxon>,
    rules: HashMap<Uuid, TaxonRule>,
    /// Keyed by `(product_id, taxon_id)`.
    classifications: HashMap<(Uuid, Uuid), Classification>,
    products: HashMap<Uuid, Product>,
}

impl State {
    fn name_taken(&self, name: &str, me: Uuid) -> bool {
        self.taxonomies.values().any(|t| t.id != me && t.name == name)
    }

    /// Run `transform` over one taxonomy's taxa and write its change set.
    fn transform_taxa(
        &mut self,
        taxonomy_id: Uuid,
        transform: &HierarchyTransform<'_>,
    ) -> Result<HierarchyChangeSet> {
        let snapshot: Vec<Taxon> = self
            .taxa
            .values()
            .filter(|t| t.taxonomy_id == taxonomy_id)
            .cloned()
            .collect();

        // Nothing below runs unless the transform succeeded.
        let changes = transform(snapshot)?;

        for taxon in changes.inserts.iter().chain(&changes.updates) {
            self.taxa.insert(taxon.id, taxon.clone());
        }
        let deleted: HashSet<Uuid> = changes.deletions.iter().copied().collect();
        self.remove_taxa(&deleted);
        Ok(changes)
    }

    /// Drop taxa and everything hanging off them.
    fn remove_taxa(&mut self, ids: &HashSet<Uuid>) {
        self.taxa.retain(|id, _| !ids.contains(id));
        self.rules.retain(|_, r| !ids.contains(&r.taxon_id));
        self.classifications
            .retain(|(_, taxon_id), _| !ids.contains(taxon_id));
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a catalog product.
    pub async fn upsert_product(&self, product: Product) {
        self.state
            .write()
            .await
            .products
            .insert(product.id, product);
    }
}

#[async_trait]
impl TaxonomyStore for MemoryStore {
    async fn insert_taxonomy(&self, taxonomy: &Taxonomy, root: &Taxon) -> Result<()> {
        let mut state = self.state.write().await;
        if state.name_taken(&taxonomy.name, taxonomy.id) {
            return Err(TaxonomyError::name_taken(&taxonomy.name));
        }
        state.taxonomies.insert(taxonomy.id, taxonomy.clone());
        state.taxa.insert(root.id, root.clone());
        Ok(())
    }

    async fn get_taxonomy(&self, id: Uuid) -> Result<Option<Taxonomy>> {
        Ok(self.state.read().await.taxonomies.get(&id).cloned())
    }

    async fn find_taxonomy_by_name(&self, name: &str) -> Result<Option<Taxonomy>> {
        let state = self.state.read().await;
        Ok(state.taxonomies.values().find(|t| t.name == name).cloned())
    }

    async fn list_taxonomies(&self) -> Result<Vec<Taxonomy>> {
        let state = self.state.read().await;
        let mut all: Vec<Taxonomy> = state.taxonomies.values().cloned().collect();
        all.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.name.cmp(&b.name)));
        Ok(all)
    }

    async fn update_taxonomy(
        &self,
        taxonomy: &Taxonomy,
        transform: &HierarchyTransform<'_>,
    ) -> Result<HierarchyChangeSet> {
        let mut state = self.state.write().await;
        if !state.taxonomies.contains_key(&taxonomy.id) {
            return Err(TaxonomyError::not_found("taxonomy", taxonomy.id));
        }
        if state.name_taken(&taxonomy.name, taxonomy.id) {
            return Err(TaxonomyError::name_taken(&taxonomy.name));
        }
        let changes = state.transform_taxa(taxonomy.id, transform)?;
        state.taxonomies.insert(taxonomy.id, taxonomy.clone());
        Ok(changes)
    }

    async fn delete_taxonomy(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        if state.taxonomies.remove(&id).is_none() {
            return Ok(false);
        }
        let owned: HashSet<Uuid> = state
            .taxa
            .values()
            .filter(|t| t.taxonomy_id == id)
            .map(|t| t.id)
            .collect();
        state.remove_taxa(&owned);
        Ok(true)
    }

    async fn get_taxon(&self, id: Uuid) -> Result<Option<Taxon>> {
        Ok(self.state.read().await.taxa.get(&id).cloned())
    }

    async fn get_root(&self, taxonomy_id: Uuid) -> Result<Option<Taxon>> {
        let state = self.state.read().await;
        Ok(state
            .taxa
            .values()
            .filter(|t| t.taxonomy_id == taxonomy_id && t.is_root())
            .min_by(|a, b| a.position.cmp(&b.position).then_with(|| a.name.cmp(&b.name)))
            .cloned())
    }

    async fn list_taxa(&self, taxonomy_id: Uuid) -> Result<Vec<Taxon>> {
        let state = self.state.read().await;
        let mut taxa: Vec<Taxon> = state
            .taxa
            .values()
            .filter(|t| t.taxonomy_id == taxonomy_id)
            .cloned()
            .collect();
        taxa.sort_by(|a, b| {
            a.depth
                .cmp(&b.depth)
                .then_with(|| a.position.cmp(&b.position))
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(taxa)
    }

    async fn count_children(&self, parent_id: Uuid) -> Result<usize> {
        let state = self.state.read().await;
        Ok(state
            .taxa
            .values()
            .filter(|t| t.parent_id == Some(parent_id))
            .count())
    }

    async fn query_taxa(&self, query: &TaxonQuery) -> Result<(Vec<Taxon>, u64)> {
        let state = self.state.read().await;
        Ok(query.apply(state.taxa.values().cloned()))
    }

    async fn apply_hierarchy_transform(
        &self,
        taxonomy_id: Uuid,
        transform: &HierarchyTransform<'_>,
    ) -> Result<HierarchyChangeSet> {
        let mut state = self.state.write().await;
        if !state.taxonomies.contains_key(&taxonomy_id) {
            return Err(TaxonomyError::not_found("taxonomy", taxonomy_id));
        }
        state.transform_taxa(taxonomy_id, transform)
    }
}

#[async_trait]
impl RuleStore for MemoryStore {
    async fn insert_rule(&self, rule: &TaxonRule) -> Result<()> {
        self.state.write().await.rules.insert(rule.id, rule.clone());
        Ok(())
    }

    async fn get_rule(&self, id: Uuid) -> Result<Option<TaxonRule>> {
        Ok(self.state.read().await.rules.get(&id).cloned())
    }

    async fn list_rules(&self, taxon_id: Uuid) -> Result<Vec<TaxonRule>> {
        let state = self.state.read().await;
        let mut rules: Vec<TaxonRule> = state
            .rules
            .values()
            .filter(|r| r.taxon_id == taxon_id)
            .cloned()
            .collect();
        rules.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(rules)
    }

    async fn delete_rule(&self, id: Uuid) -> Result<bool> {
        Ok(self.state.write().await.rules.remove(&id).is_some())
    }
}

#[async_trait]
impl ClassificationStore for MemoryStore {
    async fn get_classification(
        &self,
        product_id: Uuid,
        taxon_id: Uuid,
    ) -> Result<Option<Classification>> {
        let state = self.state.read().await;
        Ok(state.classifications.get(&(product_id, taxon_id)).cloned())
    }

    async fn list_for_taxon(&self, taxon_id: Uuid) -> Result<Vec<Classification>> {
        let state = self.state.read().await;
        let mut rows: Vec<Classification> = state
            .classifications
            .values()
            .filter(|c| c.taxon_id == taxon_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(rows)
    }

    async fn count_for_taxon(&self, taxon_id: Uuid) -> Result<usize> {
        let state = self.state.read().await;
        Ok(state
            .classifications
            .values()
            .filter(|c| c.taxon_id == taxon_id)
            .count())
    }

    async fn insert_classification(&self, classification: &Classification) -> Result<()> {
        let key = (classification.product_id, classification.taxon_id);
        let mut state = self.state.write().await;
        if state.classifications.contains_key(&key) {
            return Err(TaxonomyError::Failure(anyhow::anyhow!(
                "duplicate classification for product {} in taxon {}",
                key.0,
                key.1
            )));
        }
        state.classifications.insert(key, classification.clone());
        Ok(())
    }

    async fn update_classification(&self, classification: &Classification) -> Result<()> {
        let key = (classification.product_id, classification.taxon_id);
        let mut state = self.state.write().await;
        match state.classifications.get_mut(&key) {
            Some(slot) => {
                *slot = classification.clone();
                Ok(())
            }
            None => Err(TaxonomyError::NotFound(format!(
                "classification of product {} in taxon {}",
                key.0, key.1
            ))),
        }
    }

    async fn delete_classification(&self, product_id: Uuid, taxon_id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        Ok(state
            .classifications
            .remove(&(product_id, taxon_id))
            .is_some())
    }

    async fn replace_automatic(
        &self,
        taxon_id: Uuid,
        product_ids: &[Uuid],
    ) -> Result<AutomaticDiff> {
        let mut state = self.state.write().await;
        let current: Vec<Classification> = state
            .classifications
            .values()
            .filter(|c| c.taxon_id == taxon_id)
            .cloned()
            .collect();
        let plan = plan_automatic(&current, product_ids);

        for product_id in &plan.remove {
            state.classifications.remove(&(*product_id, taxon_id));
        }
        for &(product_id, position) in &plan.reposition {
            if let Some(row) = state.classifications.get_mut(&(product_id, taxon_id)) {
                row.position = position;
            }
        }
        let now = Utc::now();
        for &(product_id, position) in &plan.add {
            state.classifications.insert(
                (product_id, taxon_id),
                Classification {
                    id: Uuid::new_v4(),
                    product_id,
                    taxon_id,
                    position,
                    is_automatic: true,
                    created_at: now,
                },
            );
        }
        Ok(plan.diff())
    }
}

#[async_trait]
impl ProductCatalog for MemoryStore {
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let state = self.state.read().await;
        let mut products: Vec<Product> = state.products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{codes, Violation};

    async fn seeded() -> (MemoryStore, Taxonomy, Taxon) {
        let store = MemoryStore::new();
        let now = Utc::now();
        let taxonomy = Taxonomy {
            id: Uuid::new_v4(),
            name: "Catalog".into(),
            position: 0,
            created_at: now,
            updated_at: now,
        };
        let root = Taxon::root_for(&taxonomy);
        store.insert_taxonomy(&taxonomy, &root).await.unwrap();
        (store, taxonomy, root)
    }

    fn manual(product_id: Uuid, taxon_id: Uuid, position: i32) -> Classification {
        Classification {
            id: Uuid::new_v4(),
            product_id,
            taxon_id,
            position,
            is_automatic: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn failed_transform_writes_nothing() {
        let (store, taxonomy, root) = seeded().await;
        let err = store
            .apply_hierarchy_transform(taxonomy.id, &|_taxa: Vec<Taxon>| {
                Err(TaxonomyError::invalid(Violation::new(
                    codes::HIERARCHY_CYCLE,
                    "refused",
                )))
            })
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 422);
        assert_eq!(store.get_taxon(root.id).await.unwrap(), Some(root));
    }

    fn rename_root(name: &'static str) -> impl Fn(Vec<Taxon>) -> Result<HierarchyChangeSet> {
        move |taxa: Vec<Taxon>| {
            let mut updates = taxa;
            for taxon in &mut updates {
                taxon.name = name.to_string();
            }
            Ok(HierarchyChangeSet {
                updates,
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn update_taxonomy_writes_row_and_taxa_together() {
        let (store, mut taxonomy, root) = seeded().await;
        taxonomy.name = "Store".into();
        store
            .update_taxonomy(&taxonomy, &rename_root("Store"))
            .await
            .unwrap();
        let stored = store.get_taxonomy(taxonomy.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Store");
        let stored_root = store.get_taxon(root.id).await.unwrap().unwrap();
        assert_eq!(stored_root.name, "Store");
    }

    #[tokio::test]
    async fn update_taxonomy_with_taken_name_writes_nothing() {
        let (store, mut taxonomy, root) = seeded().await;
        let now = Utc::now();
        let other = Taxonomy {
            id: Uuid::new_v4(),
            name: "Archive".into(),
            position: 1,
            created_at: now,
            updated_at: now,
        };
        store
            .insert_taxonomy(&other, &Taxon::root_for(&other))
            .await
            .unwrap();

        taxonomy.name = "Archive".into();
        let err = store
            .update_taxonomy(&taxonomy, &rename_root("Archive"))
            .await
            .unwrap_err();
        assert_eq!(err.violations()[0].code, codes::TAXONOMY_NAME_TAKEN);
        let stored = store.get_taxonomy(taxonomy.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Catalog");
        assert_eq!(store.get_taxon(root.id).await.unwrap(), Some(root));
    }

    #[tokio::test]
    async fn update_taxonomy_keeps_row_when_transform_fails() {
        let (store, mut taxonomy, _root) = seeded().await;
        taxonomy.name = "Store".into();
        let err = store
            .update_taxonomy(&taxonomy, &|_taxa: Vec<Taxon>| {
                Err(TaxonomyError::invalid(Violation::new(
                    codes::HIERARCHY_CYCLE,
                    "refused",
                )))
            })
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 422);
        let stored = store.get_taxonomy(taxonomy.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Catalog");
    }

    #[tokio::test]
    async fn insert_taxonomy_rejects_taken_name() {
        let (store, taxonomy, _root) = seeded().await;
        let now = Utc::now();
        let twin = Taxonomy {
            id: Uuid::new_v4(),
            name: taxonomy.name.clone(),
            position: 1,
            created_at: now,
            updated_at: now,
        };
        let err = store
            .insert_taxonomy(&twin, &Taxon::root_for(&twin))
            .await
            .unwrap_err();
        assert_eq!(err.violations()[0].code, codes::TAXONOMY_NAME_TAKEN);
        assert!(store.get_taxonomy(twin.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn transform_on_missing_taxonomy_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .apply_hierarchy_transform(Uuid::new_v4(), &|_taxa: Vec<Taxon>| {
                Ok(HierarchyChangeSet::default())
            })
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 404);
    }

    #[tokio::test]
    async fn deleting_taxonomy_cascades() {
        let (store, taxonomy, root) = seeded().await;
        store
            .insert_rule(&TaxonRule {
                id: Uuid::new_v4(),
                taxon_id: root.id,
                expression: "price < 5".into(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        assert!(store.delete_taxonomy(taxonomy.id).await.unwrap());
        assert!(store.get_taxon(root.id).await.unwrap().is_none());
        assert!(store.list_rules(root.id).await.unwrap().is_empty());
        assert!(!store.delete_taxonomy(taxonomy.id).await.unwrap());
    }

    #[tokio::test]
    async fn replace_automatic_keeps_manual_rows() {
        let (store, _, root) = seeded().await;
        let (p1, p2, p3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        store
            .insert_classification(&manual(p1, root.id, 0))
            .await
            .unwrap();

        let diff = store.replace_automatic(root.id, &[p1, p2, p3]).await.unwrap();
        assert_eq!(diff, AutomaticDiff { added: 2, removed: 0 });

        let rows = store.list_for_taxon(root.id).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert!(!rows[0].is_automatic);
        assert_eq!(rows[0].product_id, p1);
        assert_eq!((rows[1].product_id, rows[1].position), (p2, 1));
        assert_eq!((rows[2].product_id, rows[2].position), (p3, 2));

        let diff = store.replace_automatic(root.id, &[p3]).await.unwrap();
        assert_eq!(diff, AutomaticDiff { added: 0, removed: 1 });
        let diff = store.replace_automatic(root.id, &[p3]).await.unwrap();
        assert_eq!(diff, AutomaticDiff::default());

        let diff = store.replace_automatic(root.id, &[]).await.unwrap();
        assert_eq!(diff.removed, 1);
        let rows = store.list_for_taxon(root.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].product_id, p1);
        assert!(!rows[0].is_automatic);
    }
}
