//! PostgreSQL adapter for the taxonomy hierarchy.
//!
//! Implements the `taxon_core` port traits with runtime sqlx queries and
//! ships the schema as a single idempotent migration.

pub mod query_builder;
pub mod sqlx_types;
mod store;

use std::sync::Arc;

use sqlx::PgPool;
use taxon_core::TaxonomyService;

pub use store::{PgClassificationStore, PgProductCatalog, PgRuleStore, PgTaxonomyStore};

const SCHEMA: &str = include_str!("../migrations/001_taxonomy.sql");

/// Apply the taxonomy schema. Safe to run on every start.
pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    tracing::info!("taxonomy schema applied");
    Ok(())
}

/// One adapter per port, all sharing the same pool.
pub struct PgStores {
    pub taxonomies: Arc<PgTaxonomyStore>,
    pub rules: Arc<PgRuleStore>,
    pub classifications: Arc<PgClassificationStore>,
    pub catalog: Arc<PgProductCatalog>,
}

impl PgStores {
    pub fn new(pool: PgPool) -> Self {
        Self {
            taxonomies: Arc::new(PgTaxonomyStore::new(pool.clone())),
            rules: Arc::new(PgRuleStore::new(pool.clone())),
            classifications: Arc::new(PgClassificationStore::new(pool.clone())),
            catalog: Arc::new(PgProductCatalog::new(pool)),
        }
    }

    pub fn service(&self) -> TaxonomyService {
        TaxonomyService::new(
            self.taxonomies.clone(),
            self.rules.clone(),
            self.classifications.clone(),
            self.catalog.clone(),
        )
    }
}
