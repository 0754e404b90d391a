//! Core domain types for the taxonomy hierarchy.
//! Pure value types with no DB dependency.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

// ── Enums ─────────────────────────────────────────────────────

/// How the rules attached to a taxon combine when classifying products.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MatchPolicy {
    /// Every rule must match.
    #[default]
    All,
    /// At least one rule must match.
    Any,
}

/// What happens to the children of a taxon being deleted.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeletePolicy {
    /// Refuse to delete a taxon that still has children.
    #[default]
    Restrict,
    /// Move the children under the deleted taxon's parent, in its slot.
    Reparent,
}

// ── Entities ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Taxonomy {
    pub id: Uuid,
    pub name: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A node of a taxonomy tree.
///
/// `materialized_path`, `depth` and `pretty_name` are derived from the
/// parent chain; `hierarchy::rebuild` is the only writer of those fields
/// apart from creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Taxon {
    pub id: Uuid,
    pub taxonomy_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub pretty_name: String,
    pub description: Option<String>,
    pub position: i32,
    /// Ancestor ids root-first, ending with this taxon's id.
    pub materialized_path: Vec<Uuid>,
    pub depth: u32,
    pub rules_match_policy: MatchPolicy,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Taxon {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// A fresh root for `taxonomy`, already in rebuilt shape.
    pub fn root_for(taxonomy: &Taxonomy) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            taxonomy_id: taxonomy.id,
            parent_id: None,
            name: taxonomy.name.clone(),
            slug: crate::slug::root_slug(&taxonomy.name),
            pretty_name: taxonomy.name.clone(),
            description: None,
            position: 0,
            materialized_path: vec![id],
            depth: 0,
            rules_match_policy: MatchPolicy::default(),
            created_at: taxonomy.created_at,
            updated_at: taxonomy.updated_at,
        }
    }
}

/// A stored predicate used to classify products into a taxon automatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonRule {
    pub id: Uuid,
    pub taxon_id: Uuid,
    pub expression: String,
    pub created_at: DateTime<Utc>,
}

/// Assignment of a product to a taxon, manual or rule-derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub id: Uuid,
    pub product_id: Uuid,
    pub taxon_id: Uuid,
    pub position: i32,
    pub is_automatic: bool,
    pub created_at: DateTime<Utc>,
}

/// Catalog read model: the fields the rule language can see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
    pub price: Decimal,
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

// ── Command inputs ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTaxonomy {
    pub name: String,
    #[serde(default)]
    pub position: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTaxon {
    pub taxonomy_id: Uuid,
    pub parent_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Sibling slot; `None` appends after the last sibling.
    #[serde(default)]
    pub position: Option<i32>,
    #[serde(default)]
    pub rules_match_policy: Option<MatchPolicy>,
}

/// Partial update of a taxon. An empty `description` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaxonPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rules_match_policy: Option<MatchPolicy>,
}

/// Reparent and/or reorder. `parent_id: None` keeps the current parent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MoveTaxon {
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub position: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRule {
    pub expression: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyProduct {
    pub product_id: Uuid,
    #[serde(default)]
    pub position: Option<i32>,
}

// ── Results ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyDetail {
    pub taxonomy: Taxonomy,
    pub root: Option<Taxon>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonDetail {
    pub taxon: Taxon,
    pub breadcrumbs: Vec<crate::projection::Breadcrumb>,
    pub children_count: usize,
    pub rules: Vec<TaxonRule>,
    pub classification_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildSummary {
    pub taxonomy_id: Uuid,
    pub visited: usize,
    pub updated: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegenerationSummary {
    pub taxon_id: Uuid,
    pub matched: usize,
    pub added: usize,
    pub removed: usize,
}

/// Row-level effect of replacing a taxon's automatic classifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutomaticDiff {
    pub added: usize,
    pub removed: usize,
}
