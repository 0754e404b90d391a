//! Row types for runtime `query_as` and their conversion into core types.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use uuid::Uuid;

use taxon_core::types::{Classification, MatchPolicy, Product, Taxon, TaxonRule, Taxonomy};

/// Column list matching [`PgTaxonRow`].
pub const TAXON_COLUMNS: &str = "id, taxonomy_id, parent_id, name, slug, pretty_name, description, \
     position, materialized_path, depth, rules_match_policy, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
pub struct PgTaxonomyRow {
    pub id: Uuid,
    pub name: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PgTaxonomyRow> for Taxonomy {
    fn from(r: PgTaxonomyRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            position: r.position,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PgTaxonRow {
    pub id: Uuid,
    pub taxonomy_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub pretty_name: String,
    pub description: Option<String>,
    pub position: i32,
    pub materialized_path: Vec<Uuid>,
    pub depth: i32,
    pub rules_match_policy: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PgTaxonRow> for Taxon {
    type Error = String;

    fn try_from(r: PgTaxonRow) -> Result<Self, Self::Error> {
        let rules_match_policy = MatchPolicy::from_str(&r.rules_match_policy)
            .map_err(|_| format!("taxon {}: unknown match policy '{}'", r.id, r.rules_match_policy))?;
        let depth = u32::try_from(r.depth)
            .map_err(|_| format!("taxon {}: negative depth {}", r.id, r.depth))?;
        Ok(Self {
            id: r.id,
            taxonomy_id: r.taxonomy_id,
            parent_id: r.parent_id,
            name: r.name,
            slug: r.slug,
            pretty_name: r.pretty_name,
            description: r.description,
            position: r.position,
            materialized_path: r.materialized_path,
            depth,
            rules_match_policy,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PgRuleRow {
    pub id: Uuid,
    pub taxon_id: Uuid,
    pub expression: String,
    pub created_at: DateTime<Utc>,
}

impl From<PgRuleRow> for TaxonRule {
    fn from(r: PgRuleRow) -> Self {
        Self {
            id: r.id,
            taxon_id: r.taxon_id,
            expression: r.expression,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PgClassificationRow {
    pub id: Uuid,
    pub product_id: Uuid,
    pub taxon_id: Uuid,
    pub position: i32,
    pub is_automatic: bool,
    pub created_at: DateTime<Utc>,
}

impl From<PgClassificationRow> for Classification {
    fn from(r: PgClassificationRow) -> Self {
        Self {
            id: r.id,
            product_id: r.product_id,
            taxon_id: r.taxon_id,
            position: r.position,
            is_automatic: r.is_automatic,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PgProductRow {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
    pub price: Decimal,
    pub available: bool,
    pub tags: Vec<String>,
    pub properties: Json<BTreeMap<String, String>>,
}

impl From<PgProductRow> for Product {
    fn from(r: PgProductRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            sku: r.sku,
            price: r.price,
            available: r.available,
            tags: r.tags,
            properties: r.properties.0,
        }
    }
}
