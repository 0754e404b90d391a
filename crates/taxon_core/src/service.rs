//! TaxonomyService: one method per use case.
//!
//! Holds the storage ports via `Arc<dyn PortTrait>` so the same logic runs
//! against Postgres or [`MemoryStore`]. Every structural change (create,
//! update, move, delete, rename, rebuild) is expressed as a pure transform
//! over the taxonomy's taxa and handed to
//! [`TaxonomyStore::apply_hierarchy_transform`], which runs load, validate,
//! rebuild and write inside one transaction.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{codes, TaxonomyError, Violation};
use crate::hierarchy::{
    ancestors_of, children_of, place_among_siblings, rebuild, validate, HierarchyChangeSet,
    HierarchyLimits,
};
use crate::memory::MemoryStore;
use crate::ports::{ClassificationStore, ProductCatalog, Result, RuleStore, TaxonomyStore};
use crate::projection::{
    build_tree, Breadcrumb, PagedList, TaxonListItem, TaxonQuery, TreeQuery, TreeResponse,
    DEFAULT_PAGE_SIZE,
};
use crate::regeneration::{compile_rules, select_products};
use crate::rules::parse_rule;
use crate::slug::{is_valid_slug, root_slug, slugify};
use crate::types::*;

pub const MAX_NAME_CHARS: usize = 255;

pub struct TaxonomyService {
    taxonomies: Arc<dyn TaxonomyStore>,
    rules: Arc<dyn RuleStore>,
    classifications: Arc<dyn ClassificationStore>,
    catalog: Arc<dyn ProductCatalog>,
    limits: HierarchyLimits,
    default_page_size: u32,
}

impl TaxonomyService {
    pub fn new(
        taxonomies: Arc<dyn TaxonomyStore>,
        rules: Arc<dyn RuleStore>,
        classifications: Arc<dyn ClassificationStore>,
        catalog: Arc<dyn ProductCatalog>,
    ) -> Self {
        Self {
            taxonomies,
            rules,
            classifications,
            catalog,
            limits: HierarchyLimits::default(),
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Every port served by one in-process store.
    pub fn in_memory(store: Arc<MemoryStore>) -> Self {
        Self::new(store.clone(), store.clone(), store.clone(), store)
    }

    pub fn with_limits(mut self, limits: HierarchyLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_default_page_size(mut self, page_size: u32) -> Self {
        self.default_page_size = page_size.max(1);
        self
    }

    pub fn limits(&self) -> HierarchyLimits {
        self.limits
    }

    // ── Lookups ────────────────────────────────────────────────

    async fn require_taxonomy(&self, id: Uuid) -> Result<Taxonomy> {
        self.taxonomies
            .get_taxonomy(id)
            .await?
            .ok_or_else(|| TaxonomyError::not_found("taxonomy", id))
    }

    async fn require_taxon(&self, id: Uuid) -> Result<Taxon> {
        self.taxonomies
            .get_taxon(id)
            .await?
            .ok_or_else(|| TaxonomyError::not_found("taxon", id))
    }

    /// Run a structural edit through the store and log its outcome.
    async fn restructure<F>(&self, taxonomy_id: Uuid, edit: F) -> Result<HierarchyChangeSet>
    where
        F: Fn(&mut Vec<Taxon>) -> Result<()> + Send + Sync,
    {
        let transform = settled(edit, self.limits);
        let result = self
            .taxonomies
            .apply_hierarchy_transform(taxonomy_id, &transform)
            .await;
        report(taxonomy_id, &result);
        result
    }

    // ── Taxonomies ─────────────────────────────────────────────

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_taxonomy(&self, input: NewTaxonomy) -> Result<TaxonomyDetail> {
        let name = check_name(&input.name, codes::TAXONOMY_NAME_EMPTY)?;
        if self.taxonomies.find_taxonomy_by_name(&name).await?.is_some() {
            return Err(TaxonomyError::name_taken(&name));
        }
        if let Some(position) = input.position {
            check_position(position)?;
        }
        let position = match input.position {
            Some(p) => p,
            None => self.taxonomies.list_taxonomies().await?.len() as i32,
        };

        let now = Utc::now();
        let taxonomy = Taxonomy {
            id: Uuid::new_v4(),
            name,
            position,
            created_at: now,
            updated_at: now,
        };
        let root = Taxon::root_for(&taxonomy);
        self.taxonomies.insert_taxonomy(&taxonomy, &root).await?;

        info!(taxonomy_id = %taxonomy.id, root_id = %root.id, "taxonomy created");
        Ok(TaxonomyDetail {
            taxonomy,
            root: Some(root),
        })
    }

    pub async fn get_taxonomy(&self, id: Uuid) -> Result<TaxonomyDetail> {
        let taxonomy = self.require_taxonomy(id).await?;
        let root = self.taxonomies.get_root(id).await?;
        Ok(TaxonomyDetail { taxonomy, root })
    }

    pub async fn list_taxonomies(&self) -> Result<Vec<Taxonomy>> {
        self.taxonomies.list_taxonomies().await
    }

    /// Rename a taxonomy and its root taxon (descendant pretty names follow).
    /// The taxonomy row and the hierarchy change land in one store
    /// transaction.
    #[instrument(skip(self))]
    pub async fn rename_taxonomy(&self, id: Uuid, name: &str) -> Result<TaxonomyDetail> {
        let mut taxonomy = self.require_taxonomy(id).await?;
        let name = check_name(name, codes::TAXONOMY_NAME_EMPTY)?;
        if let Some(other) = self.taxonomies.find_taxonomy_by_name(&name).await? {
            if other.id != id {
                return Err(TaxonomyError::name_taken(&name));
            }
        }

        taxonomy.name = name.clone();
        taxonomy.updated_at = Utc::now();
        let transform = settled(
            move |taxa: &mut Vec<Taxon>| {
                let root = taxa.iter_mut().filter(|t| t.is_root()).min_by(|a, b| {
                    a.position.cmp(&b.position).then_with(|| a.name.cmp(&b.name))
                });
                if let Some(root) = root {
                    root.name = name.clone();
                    root.slug = root_slug(&name);
                }
                Ok(())
            },
            self.limits,
        );
        let result = self.taxonomies.update_taxonomy(&taxonomy, &transform).await;
        report(id, &result);
        result?;

        info!(taxonomy_id = %id, "taxonomy renamed");
        self.get_taxonomy(id).await
    }

    #[instrument(skip(self))]
    pub async fn delete_taxonomy(&self, id: Uuid) -> Result<()> {
        if !self.taxonomies.delete_taxonomy(id).await? {
            return Err(TaxonomyError::not_found("taxonomy", id));
        }
        info!(taxonomy_id = %id, "taxonomy deleted");
        Ok(())
    }

    // ── Hierarchy maintenance ──────────────────────────────────

    /// Check the taxonomy's parent graph. Reports the first violation and
    /// never repairs anything.
    #[instrument(skip(self))]
    pub async fn validate_hierarchy(&self, taxonomy_id: Uuid) -> Result<()> {
        self.require_taxonomy(taxonomy_id).await?;
        let taxa = self.taxonomies.list_taxa(taxonomy_id).await?;
        validate(&taxa, &self.limits).map_err(|violation| {
            warn!(%taxonomy_id, %violation, "hierarchy invalid");
            TaxonomyError::invalid(violation)
        })?;
        debug!(%taxonomy_id, taxa = taxa.len(), "hierarchy valid");
        Ok(())
    }

    /// Recompute depth, path, pretty name and sibling positions for the whole
    /// taxonomy. Refuses (and writes nothing) when the hierarchy is invalid.
    #[instrument(skip(self))]
    pub async fn rebuild_hierarchy(&self, taxonomy_id: Uuid) -> Result<RebuildSummary> {
        let changes = self.restructure(taxonomy_id, |_| Ok(())).await?;
        let summary = RebuildSummary {
            taxonomy_id,
            visited: changes.visited,
            updated: changes.updates.len(),
        };
        info!(%taxonomy_id, visited = summary.visited, updated = summary.updated, "hierarchy rebuilt");
        Ok(summary)
    }

    // ── Taxa ───────────────────────────────────────────────────

    #[instrument(skip(self, input), fields(taxonomy_id = %input.taxonomy_id, parent_id = %input.parent_id))]
    pub async fn create_taxon(&self, input: NewTaxon) -> Result<Taxon> {
        let name = check_name(&input.name, codes::TAXON_NAME_EMPTY)?;
        if let Some(position) = input.position {
            check_position(position)?;
        }
        let slug = resolve_slug(input.slug.as_deref(), &name)?;

        self.require_taxonomy(input.taxonomy_id).await?;
        let parent = self.require_taxon(input.parent_id).await?;
        let id = Uuid::new_v4();
        if parent.taxonomy_id != input.taxonomy_id {
            return Err(TaxonomyError::invalid(Violation::invalid_parent(
                id,
                parent.id,
            )));
        }

        let now = Utc::now();
        let fresh = Taxon {
            id,
            taxonomy_id: input.taxonomy_id,
            parent_id: Some(parent.id),
            name,
            slug,
            pretty_name: String::new(),
            description: input.description.filter(|d| !d.trim().is_empty()),
            position: i32::MAX,
            materialized_path: Vec::new(),
            depth: 0,
            rules_match_policy: input.rules_match_policy.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        let position = input.position;

        let changes = self
            .restructure(input.taxonomy_id, move |taxa| {
                if !taxa.iter().any(|t| t.id == parent.id) {
                    return Err(TaxonomyError::not_found("taxon", parent.id));
                }
                ensure_slug_free(taxa, Some(parent.id), &fresh.slug, fresh.id)?;
                taxa.push(fresh.clone());
                place_among_siblings(taxa, fresh.id, position);
                Ok(())
            })
            .await?;

        let created = changes
            .inserts
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| TaxonomyError::not_found("taxon", id))?;
        info!(taxon_id = %created.id, pretty_name = %created.pretty_name, "taxon created");
        Ok(created)
    }

    pub async fn get_taxon(&self, id: Uuid) -> Result<TaxonDetail> {
        let taxon = self.require_taxon(id).await?;
        let taxa = self.taxonomies.list_taxa(taxon.taxonomy_id).await?;

        let mut breadcrumbs: Vec<Breadcrumb> = ancestors_of(&taxa, id)
            .into_iter()
            .rev()
            .filter_map(|a| taxa.iter().find(|t| t.id == a).map(Breadcrumb::from))
            .collect();
        breadcrumbs.push(Breadcrumb::from(&taxon));

        Ok(TaxonDetail {
            children_count: self.taxonomies.count_children(id).await?,
            rules: self.rules.list_rules(id).await?,
            classification_count: self.classifications.count_for_taxon(id).await?,
            breadcrumbs,
            taxon,
        })
    }

    /// Partial update. A name change flows into every descendant's pretty
    /// name through the rebuild.
    #[instrument(skip(self, patch))]
    pub async fn update_taxon(&self, id: Uuid, patch: TaxonPatch) -> Result<Taxon> {
        let current = self.require_taxon(id).await?;
        let name = match &patch.name {
            Some(n) => Some(check_name(n, codes::TAXON_NAME_EMPTY)?),
            None => None,
        };
        let slug = match &patch.slug {
            Some(s) => Some(resolve_slug(Some(s), &current.name)?),
            None => None,
        };
        let description = patch
            .description
            .map(|d| Some(d).filter(|d| !d.trim().is_empty()));
        let policy = patch.rules_match_policy;

        self.restructure(current.taxonomy_id, move |taxa| {
            let parent_id = find(taxa, id)?.parent_id;
            if let Some(slug) = &slug {
                ensure_slug_free(taxa, parent_id, slug, id)?;
            }
            let taxon = find_mut(taxa, id)?;
            if let Some(name) = &name {
                taxon.name = name.clone();
            }
            if let Some(slug) = &slug {
                taxon.slug = slug.clone();
            }
            if let Some(description) = &description {
                taxon.description = description.clone();
            }
            if let Some(policy) = policy {
                taxon.rules_match_policy = policy;
            }
            Ok(())
        })
        .await?;

        info!(taxon_id = %id, "taxon updated");
        self.require_taxon(id).await
    }

    /// Reparent and/or reorder a taxon.
    #[instrument(skip(self, input), fields(parent_id = ?input.parent_id, position = ?input.position))]
    pub async fn move_taxon(&self, id: Uuid, input: MoveTaxon) -> Result<Taxon> {
        let current = self.require_taxon(id).await?;
        if current.is_root() {
            return Err(TaxonomyError::invalid(
                Violation::new(codes::TAXON_ROOT_IMMUTABLE, "a taxonomy root cannot be moved")
                    .on(id),
            ));
        }
        if let Some(position) = input.position {
            check_position(position)?;
        }
        if let Some(parent_id) = input.parent_id {
            let parent = self.require_taxon(parent_id).await?;
            if parent.taxonomy_id != current.taxonomy_id {
                return Err(TaxonomyError::invalid(Violation::invalid_parent(
                    id, parent_id,
                )));
            }
        }

        let position = input.position;
        let new_parent = input.parent_id;
        self.restructure(current.taxonomy_id, move |taxa| {
            let me = find(taxa, id)?;
            let slug = me.slug.clone();
            let parent_id = new_parent.or(me.parent_id);
            if parent_id != me.parent_id {
                ensure_slug_free(taxa, parent_id, &slug, id)?;
            }
            let taxon = find_mut(taxa, id)?;
            taxon.parent_id = parent_id;
            // A cycle introduced here is reported by the validator in `settle`.
            place_among_siblings(taxa, id, position);
            Ok(())
        })
        .await?;

        info!(taxon_id = %id, "taxon moved");
        self.require_taxon(id).await
    }

    /// Delete a non-root taxon. Its rules and classifications go with it.
    #[instrument(skip(self))]
    pub async fn delete_taxon(&self, id: Uuid, policy: DeletePolicy) -> Result<()> {
        let current = self.require_taxon(id).await?;
        if current.is_root() {
            return Err(TaxonomyError::invalid(
                Violation::new(
                    codes::TAXON_ROOT_IMMUTABLE,
                    "a taxonomy root cannot be deleted; delete the taxonomy instead",
                )
                .on(id),
            ));
        }

        self.restructure(current.taxonomy_id, move |taxa| {
            let me = find(taxa, id)?.clone();
            let children = children_of(taxa, id);
            if !children.is_empty() {
                match policy {
                    DeletePolicy::Restrict => {
                        return Err(TaxonomyError::invalid(
                            Violation::new(
                                codes::TAXON_HAS_CHILDREN,
                                format!("taxon has {} children", children.len()),
                            )
                            .on(id),
                        ))
                    }
                    DeletePolicy::Reparent => adopt_children(taxa, &me, &children)?,
                }
            }
            taxa.retain(|t| t.id != id);
            Ok(())
        })
        .await?;

        info!(taxon_id = %id, policy = AsRef::<str>::as_ref(&policy), "taxon deleted");
        Ok(())
    }

    // ── Projections ────────────────────────────────────────────

    pub async fn get_flat_taxons(&self, query: TaxonQuery) -> Result<PagedList<TaxonListItem>> {
        if let Some(taxonomy_id) = query.taxonomy_id {
            self.require_taxonomy(taxonomy_id).await?;
        }
        let query = query.normalized(self.default_page_size);
        let (taxa, total) = self.taxonomies.query_taxa(&query).await?;
        let items = taxa.into_iter().map(TaxonListItem::from).collect();
        Ok(PagedList::new(items, query.page(), query.page_size(), total))
    }

    pub async fn build_taxon_tree(&self, query: TreeQuery) -> Result<TreeResponse> {
        self.require_taxonomy(query.taxonomy_id).await?;
        let taxa = self.taxonomies.list_taxa(query.taxonomy_id).await?;
        build_tree(&taxa, &query)
    }

    // ── Rules ──────────────────────────────────────────────────

    #[instrument(skip(self, input))]
    pub async fn add_rule(&self, taxon_id: Uuid, input: NewRule) -> Result<TaxonRule> {
        self.require_taxon(taxon_id).await?;
        let expression = input.expression.trim().to_string();
        if let Err(e) = parse_rule(&expression) {
            return Err(TaxonomyError::invalid(
                Violation::new(codes::RULE_MALFORMED, e.to_string()).on(taxon_id),
            ));
        }
        let rule = TaxonRule {
            id: Uuid::new_v4(),
            taxon_id,
            expression,
            created_at: Utc::now(),
        };
        self.rules.insert_rule(&rule).await?;
        info!(rule_id = %rule.id, %taxon_id, "rule added");
        Ok(rule)
    }

    pub async fn list_rules(&self, taxon_id: Uuid) -> Result<Vec<TaxonRule>> {
        self.require_taxon(taxon_id).await?;
        self.rules.list_rules(taxon_id).await
    }

    #[instrument(skip(self))]
    pub async fn remove_rule(&self, rule_id: Uuid) -> Result<()> {
        if !self.rules.delete_rule(rule_id).await? {
            return Err(TaxonomyError::not_found("rule", rule_id));
        }
        info!(%rule_id, "rule removed");
        Ok(())
    }

    // ── Classifications ────────────────────────────────────────

    /// Manually place a product in a taxon. An existing automatic row for the
    /// product is promoted to manual so regeneration leaves it alone.
    #[instrument(skip(self, input), fields(product_id = %input.product_id))]
    pub async fn classify_product(
        &self,
        taxon_id: Uuid,
        input: ClassifyProduct,
    ) -> Result<Classification> {
        self.require_taxon(taxon_id).await?;
        if let Some(position) = input.position {
            check_position(position)?;
        }
        let product_id = input.product_id;
        if self.catalog.get_product(product_id).await?.is_none() {
            return Err(TaxonomyError::not_found("product", product_id));
        }

        match self
            .classifications
            .get_classification(product_id, taxon_id)
            .await?
        {
            Some(existing) if !existing.is_automatic => Err(TaxonomyError::invalid(
                Violation::new(
                    codes::CLASSIFICATION_EXISTS,
                    format!("product {product_id} is already classified here"),
                )
                .on(taxon_id),
            )),
            Some(mut existing) => {
                existing.is_automatic = false;
                if let Some(position) = input.position {
                    existing.position = position;
                }
                self.classifications.update_classification(&existing).await?;
                info!(%taxon_id, %product_id, "automatic classification made manual");
                Ok(existing)
            }
            None => {
                let position = match input.position {
                    Some(p) => p,
                    None => self.classifications.count_for_taxon(taxon_id).await? as i32,
                };
                let row = Classification {
                    id: Uuid::new_v4(),
                    product_id,
                    taxon_id,
                    position,
                    is_automatic: false,
                    created_at: Utc::now(),
                };
                self.classifications.insert_classification(&row).await?;
                info!(%taxon_id, %product_id, "product classified");
                Ok(row)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn unclassify_product(&self, taxon_id: Uuid, product_id: Uuid) -> Result<()> {
        if !self
            .classifications
            .delete_classification(product_id, taxon_id)
            .await?
        {
            return Err(TaxonomyError::NotFound(format!(
                "classification of product {product_id} in taxon {taxon_id}"
            )));
        }
        info!(%taxon_id, %product_id, "product unclassified");
        Ok(())
    }

    pub async fn list_classifications(&self, taxon_id: Uuid) -> Result<Vec<Classification>> {
        self.require_taxon(taxon_id).await?;
        self.classifications.list_for_taxon(taxon_id).await
    }

    // ── Regeneration ───────────────────────────────────────────

    /// Recompute the taxon's automatic classifications from its rules.
    /// Manual classifications are never altered.
    #[instrument(skip(self))]
    pub async fn regenerate_products_for_taxon(
        &self,
        taxon_id: Uuid,
    ) -> Result<RegenerationSummary> {
        let taxon = self.require_taxon(taxon_id).await?;
        let stored = self.rules.list_rules(taxon_id).await?;
        let compiled = compile_rules(taxon_id, &stored).map_err(|e| {
            warn!(%taxon_id, error = %e, "stored rule no longer parses");
            e
        })?;

        let products = self.catalog.list_products().await?;
        let matched = select_products(&compiled, taxon.rules_match_policy, &products);
        debug!(%taxon_id, rules = compiled.len(), products = products.len(), matched = matched.len(), "rules evaluated");

        let diff = self
            .classifications
            .replace_automatic(taxon_id, &matched)
            .await?;
        let summary = RegenerationSummary {
            taxon_id,
            matched: matched.len(),
            added: diff.added,
            removed: diff.removed,
        };
        info!(%taxon_id, matched = summary.matched, added = summary.added, removed = summary.removed, "taxon regenerated");
        Ok(summary)
    }
}

// ── Pure helpers ──────────────────────────────────────────────

/// Lift a structural edit into a store transform: the edit runs on a copy of
/// the snapshot, which is then validated, rebuilt and diffed.
fn settled<F>(
    edit: F,
    limits: HierarchyLimits,
) -> impl Fn(Vec<Taxon>) -> Result<HierarchyChangeSet> + Send + Sync
where
    F: Fn(&mut Vec<Taxon>) -> Result<()> + Send + Sync,
{
    move |before: Vec<Taxon>| {
        let mut edited = before.clone();
        edit(&mut edited)?;
        settle(&before, edited, &limits)
    }
}

fn report(taxonomy_id: Uuid, result: &Result<HierarchyChangeSet>) {
    match result {
        Ok(changes) => debug!(
            %taxonomy_id,
            inserted = changes.inserts.len(),
            updated = changes.updates.len(),
            deleted = changes.deletions.len(),
            "hierarchy change set written"
        ),
        Err(TaxonomyError::Validation(violations)) => {
            warn!(%taxonomy_id, ?violations, "structural change rejected")
        }
        Err(_) => {}
    }
}

/// Validate the edited taxa, rebuild them and diff against the snapshot.
fn settle(
    before: &[Taxon],
    edited: Vec<Taxon>,
    limits: &HierarchyLimits,
) -> Result<HierarchyChangeSet> {
    validate(&edited, limits).map_err(TaxonomyError::invalid)?;
    let outcome = rebuild(edited);
    Ok(HierarchyChangeSet::diff(
        before,
        outcome.taxa,
        outcome.visited,
        Utc::now(),
    ))
}

fn find(taxa: &[Taxon], id: Uuid) -> Result<&Taxon> {
    taxa.iter()
        .find(|t| t.id == id)
        .ok_or_else(|| TaxonomyError::not_found("taxon", id))
}

fn find_mut(taxa: &mut [Taxon], id: Uuid) -> Result<&mut Taxon> {
    taxa.iter_mut()
        .find(|t| t.id == id)
        .ok_or_else(|| TaxonomyError::not_found("taxon", id))
}

fn check_name(raw: &str, empty_code: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(TaxonomyError::invalid(Violation::new(
            empty_code,
            "name must not be empty",
        )));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(TaxonomyError::invalid(Violation::new(
            codes::TAXON_NAME_TOO_LONG,
            format!("name exceeds {MAX_NAME_CHARS} characters"),
        )));
    }
    Ok(name.to_string())
}

fn check_position(position: i32) -> Result<()> {
    if position < 0 {
        return Err(TaxonomyError::invalid(Violation::new(
            codes::TAXON_POSITION_NEGATIVE,
            format!("position {position} is negative"),
        )));
    }
    Ok(())
}

/// Explicit slug when given (must already be canonical), otherwise derived
/// from the name.
fn resolve_slug(explicit: Option<&str>, name: &str) -> Result<String> {
    let slug = match explicit.map(str::trim) {
        Some(s) => s.to_string(),
        None => slugify(name),
    };
    if !is_valid_slug(&slug) {
        return Err(TaxonomyError::invalid(Violation::new(
            codes::TAXON_SLUG_INVALID,
            format!("'{slug}' is not a valid slug (lowercase ASCII words joined by '-')"),
        )));
    }
    Ok(slug)
}

fn ensure_slug_free(taxa: &[Taxon], parent_id: Option<Uuid>, slug: &str, me: Uuid) -> Result<()> {
    let clash = taxa
        .iter()
        .find(|t| t.parent_id == parent_id && t.id != me && t.slug == slug);
    match clash {
        Some(other) => Err(TaxonomyError::invalid(
            Violation::new(
                codes::TAXON_SLUG_TAKEN,
                format!("sibling {} already uses slug '{slug}'", other.id),
            )
            .on(me),
        )),
        None => Ok(()),
    }
}

/// Hand `children` (ids of `deleted`'s children, any order) to `deleted`'s
/// parent, occupying the deleted taxon's slot in their current order.
fn adopt_children(taxa: &mut [Taxon], deleted: &Taxon, children: &[Uuid]) -> Result<()> {
    for &child in children {
        let slug = find(taxa, child)?.slug.clone();
        let clash = taxa.iter().any(|t| {
            t.parent_id == deleted.parent_id
                && t.id != deleted.id
                && !children.contains(&t.id)
                && t.slug == slug
        });
        if clash {
            return Err(TaxonomyError::invalid(
                Violation::new(
                    codes::TAXON_SLUG_TAKEN,
                    format!("child slug '{slug}' collides with a sibling of the deleted taxon"),
                )
                .on(child),
            ));
        }
    }

    let mut ordered: Vec<(i32, String, Uuid)> = children
        .iter()
        .filter_map(|&c| taxa.iter().find(|t| t.id == c))
        .map(|t| (t.position, t.name.clone(), t.id))
        .collect();
    ordered.sort();
    let width = ordered.len() as i32;

    for taxon in taxa.iter_mut() {
        if taxon.parent_id == deleted.parent_id
            && taxon.id != deleted.id
            && taxon.position > deleted.position
        {
            taxon.position += width;
        }
    }
    for (offset, (_, _, child)) in ordered.into_iter().enumerate() {
        let taxon = find_mut(taxa, child)?;
        taxon.parent_id = deleted.parent_id;
        taxon.position = deleted.position + offset as i32;
    }
    Ok(())
}
