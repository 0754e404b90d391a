//! Postgres implementations of all taxon_core port traits.
//!
//! Each adapter is a newtype wrapping PgPool. All SQL is runtime-checked
//! (sqlx::query, not sqlx::query!) to avoid a compile-time DB requirement.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use tracing::debug;
use uuid::Uuid;

use taxon_core::error::TaxonomyError;
use taxon_core::hierarchy::HierarchyChangeSet;
use taxon_core::ports::{
    ClassificationStore, HierarchyTransform, ProductCatalog, Result, RuleStore, TaxonomyStore,
};
use taxon_core::projection::TaxonQuery;
use taxon_core::regeneration::plan_automatic;
use taxon_core::types::*;

use crate::query_builder::{build_taxa_query, SqlParam};
use crate::sqlx_types::{
    PgClassificationRow, PgProductRow, PgRuleRow, PgTaxonRow, PgTaxonomyRow, TAXON_COLUMNS,
};

fn taxa_from_rows(rows: Vec<PgTaxonRow>) -> Result<Vec<Taxon>> {
    rows.into_iter()
        .map(|r| Taxon::try_from(r).map_err(|e| TaxonomyError::Failure(anyhow!(e))))
        .collect()
}

const TAXONOMY_NAME_KEY: &str = "taxonomies_name_key";

/// A write that lost the race for a taxonomy name becomes `taxonomy.name_taken`.
fn taxonomy_write_error(e: sqlx::Error, name: &str) -> TaxonomyError {
    let taken = matches!(
        &e,
        sqlx::Error::Database(db)
            if db.is_unique_violation() && db.constraint() == Some(TAXONOMY_NAME_KEY)
    );
    if taken {
        TaxonomyError::name_taken(name)
    } else {
        TaxonomyError::Failure(anyhow!(e))
    }
}

/// `SELECT ... FOR UPDATE` on the taxonomy row; serialises structural writers
/// per taxonomy without blocking readers.
async fn lock_taxonomy(conn: &mut PgConnection, taxonomy_id: Uuid) -> Result<()> {
    let locked: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM taxonomies WHERE id = $1 FOR UPDATE")
            .bind(taxonomy_id)
            .fetch_optional(conn)
            .await
            .map_err(|e| anyhow!(e))?;
    match locked {
        Some(_) => Ok(()),
        None => Err(TaxonomyError::not_found("taxonomy", taxonomy_id)),
    }
}

/// Load the taxonomy's taxa, run `transform` and write its change set on
/// `conn`. The caller owns the transaction.
async fn transform_taxa(
    conn: &mut PgConnection,
    taxonomy_id: Uuid,
    transform: &HierarchyTransform<'_>,
) -> Result<HierarchyChangeSet> {
    let sql = format!("SELECT {TAXON_COLUMNS} FROM taxa WHERE taxonomy_id = $1");
    let rows = sqlx::query_as::<_, PgTaxonRow>(&sql)
        .bind(taxonomy_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| anyhow!(e))?;
    let snapshot = taxa_from_rows(rows)?;

    let changes = transform(snapshot)?;

    for taxon in &changes.inserts {
        insert_taxon(conn, taxon).await?;
    }
    for taxon in &changes.updates {
        update_taxon(conn, taxon).await?;
    }
    if !changes.deletions.is_empty() {
        sqlx::query("DELETE FROM taxa WHERE id = ANY($1)")
            .bind(&changes.deletions)
            .execute(&mut *conn)
            .await
            .map_err(|e| anyhow!(e))?;
    }
    Ok(changes)
}

fn depth_param(depth: u32) -> i32 {
    i32::try_from(depth).unwrap_or(i32::MAX)
}

async fn insert_taxon(conn: &mut PgConnection, t: &Taxon) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO taxa (id, taxonomy_id, parent_id, name, slug, pretty_name, description,
                          position, materialized_path, depth, rules_match_policy,
                          created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(t.id)
    .bind(t.taxonomy_id)
    .bind(t.parent_id)
    .bind(&t.name)
    .bind(&t.slug)
    .bind(&t.pretty_name)
    .bind(&t.description)
    .bind(t.position)
    .bind(&t.materialized_path)
    .bind(depth_param(t.depth))
    .bind(AsRef::<str>::as_ref(&t.rules_match_policy))
    .bind(t.created_at)
    .bind(t.updated_at)
    .execute(conn)
    .await
    .map_err(|e| anyhow!(e))?;
    Ok(())
}

async fn update_taxon(conn: &mut PgConnection, t: &Taxon) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE taxa
        SET parent_id = $2, name = $3, slug = $4, pretty_name = $5, description = $6,
            position = $7, materialized_path = $8, depth = $9, rules_match_policy = $10,
            updated_at = $11
        WHERE id = $1
        "#,
    )
    .bind(t.id)
    .bind(t.parent_id)
    .bind(&t.name)
    .bind(&t.slug)
    .bind(&t.pretty_name)
    .bind(&t.description)
    .bind(t.position)
    .bind(&t.materialized_path)
    .bind(depth_param(t.depth))
    .bind(AsRef::<str>::as_ref(&t.rules_match_policy))
    .bind(t.updated_at)
    .execute(conn)
    .await
    .map_err(|e| anyhow!(e))?;
    Ok(())
}

macro_rules! bind_params {
    ($query:expr, $params:expr) => {{
        let mut query = $query;
        for p in $params {
            query = match p {
                SqlParam::Uuid(v) => query.bind(*v),
                SqlParam::Text(v) => query.bind(v.clone()),
                SqlParam::Int(v) => query.bind(*v),
                SqlParam::BigInt(v) => query.bind(*v),
            };
        }
        query
    }};
}

// ── PgTaxonomyStore ───────────────────────────────────────────

pub struct PgTaxonomyStore {
    pool: PgPool,
}

impl PgTaxonomyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaxonomyStore for PgTaxonomyStore {
    async fn insert_taxonomy(&self, taxonomy: &Taxonomy, root: &Taxon) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;
        sqlx::query(
            r#"
            INSERT INTO taxonomies (id, name, position, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(taxonomy.id)
        .bind(&taxonomy.name)
        .bind(taxonomy.position)
        .bind(taxonomy.created_at)
        .bind(taxonomy.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| taxonomy_write_error(e, &taxonomy.name))?;
        insert_taxon(&mut tx, root).await?;
        tx.commit().await.map_err(|e| anyhow!(e))?;
        Ok(())
    }

    async fn get_taxonomy(&self, id: Uuid) -> Result<Option<Taxonomy>> {
        let row = sqlx::query_as::<_, PgTaxonomyRow>(
            "SELECT id, name, position, created_at, updated_at FROM taxonomies WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(row.map(Taxonomy::from))
    }

    async fn find_taxonomy_by_name(&self, name: &str) -> Result<Option<Taxonomy>> {
        let row = sqlx::query_as::<_, PgTaxonomyRow>(
            "SELECT id, name, position, created_at, updated_at FROM taxonomies WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(row.map(Taxonomy::from))
    }

    async fn list_taxonomies(&self) -> Result<Vec<Taxonomy>> {
        let rows = sqlx::query_as::<_, PgTaxonomyRow>(
            r#"
            SELECT id, name, position, created_at, updated_at
            FROM taxonomies
            ORDER BY position, name COLLATE "C"
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(rows.into_iter().map(Taxonomy::from).collect())
    }

    async fn update_taxonomy(
        &self,
        taxonomy: &Taxonomy,
        transform: &HierarchyTransform<'_>,
    ) -> Result<HierarchyChangeSet> {
        let mut tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;
        lock_taxonomy(&mut tx, taxonomy.id).await?;

        let changes = transform_taxa(&mut tx, taxonomy.id, transform).await?;

        // A name clash here drops `tx`, taking the taxa writes with it.
        sqlx::query(
            "UPDATE taxonomies SET name = $2, position = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(taxonomy.id)
        .bind(&taxonomy.name)
        .bind(taxonomy.position)
        .bind(taxonomy.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| taxonomy_write_error(e, &taxonomy.name))?;

        tx.commit().await.map_err(|e| anyhow!(e))?;
        debug!(
            taxonomy_id = %taxonomy.id,
            updated = changes.updates.len(),
            "taxonomy update committed"
        );
        Ok(changes)
    }

    async fn delete_taxonomy(&self, id: Uuid) -> Result<bool> {
        // Taxa, rules and classifications follow through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM taxonomies WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_taxon(&self, id: Uuid) -> Result<Option<Taxon>> {
        let sql = format!("SELECT {TAXON_COLUMNS} FROM taxa WHERE id = $1");
        let row = sqlx::query_as::<_, PgTaxonRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        row.map(|r| Taxon::try_from(r).map_err(|e| TaxonomyError::Failure(anyhow!(e))))
            .transpose()
    }

    async fn get_root(&self, taxonomy_id: Uuid) -> Result<Option<Taxon>> {
        let sql = format!(
            "SELECT {TAXON_COLUMNS} FROM taxa \
             WHERE taxonomy_id = $1 AND parent_id IS NULL \
             ORDER BY position, name COLLATE \"C\" LIMIT 1"
        );
        let row = sqlx::query_as::<_, PgTaxonRow>(&sql)
            .bind(taxonomy_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        row.map(|r| Taxon::try_from(r).map_err(|e| TaxonomyError::Failure(anyhow!(e))))
            .transpose()
    }

    async fn list_taxa(&self, taxonomy_id: Uuid) -> Result<Vec<Taxon>> {
        let sql = format!(
            "SELECT {TAXON_COLUMNS} FROM taxa WHERE taxonomy_id = $1 \
             ORDER BY depth, position, name COLLATE \"C\""
        );
        let rows = sqlx::query_as::<_, PgTaxonRow>(&sql)
            .bind(taxonomy_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        taxa_from_rows(rows)
    }

    async fn count_children(&self, parent_id: Uuid) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM taxa WHERE parent_id = $1")
            .bind(parent_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(count as usize)
    }

    async fn query_taxa(&self, query: &TaxonQuery) -> Result<(Vec<Taxon>, u64)> {
        let built = build_taxa_query(query);

        let total = bind_params!(
            sqlx::query_scalar::<_, i64>(&built.count_sql),
            &built.count_params
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        let rows = bind_params!(
            sqlx::query_as::<_, PgTaxonRow>(&built.select_sql),
            &built.select_params
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        Ok((taxa_from_rows(rows)?, total.max(0) as u64))
    }

    async fn apply_hierarchy_transform(
        &self,
        taxonomy_id: Uuid,
        transform: &HierarchyTransform<'_>,
    ) -> Result<HierarchyChangeSet> {
        let mut tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;
        lock_taxonomy(&mut tx, taxonomy_id).await?;

        // Dropping `tx` on error rolls back.
        let changes = transform_taxa(&mut tx, taxonomy_id, transform).await?;

        tx.commit().await.map_err(|e| anyhow!(e))?;
        debug!(
            %taxonomy_id,
            inserted = changes.inserts.len(),
            updated = changes.updates.len(),
            deleted = changes.deletions.len(),
            "hierarchy transform committed"
        );
        Ok(changes)
    }
}

// ── PgRuleStore ───────────────────────────────────────────────

pub struct PgRuleStore {
    pool: PgPool,
}

impl PgRuleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RuleStore for PgRuleStore {
    async fn insert_rule(&self, rule: &TaxonRule) -> Result<()> {
        sqlx::query(
            "INSERT INTO taxon_rules (id, taxon_id, expression, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(rule.id)
        .bind(rule.taxon_id)
        .bind(&rule.expression)
        .bind(rule.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(())
    }

    async fn get_rule(&self, id: Uuid) -> Result<Option<TaxonRule>> {
        let row = sqlx::query_as::<_, PgRuleRow>(
            "SELECT id, taxon_id, expression, created_at FROM taxon_rules WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(row.map(TaxonRule::from))
    }

    async fn list_rules(&self, taxon_id: Uuid) -> Result<Vec<TaxonRule>> {
        let rows = sqlx::query_as::<_, PgRuleRow>(
            r#"
            SELECT id, taxon_id, expression, created_at
            FROM taxon_rules
            WHERE taxon_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(taxon_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(rows.into_iter().map(TaxonRule::from).collect())
    }

    async fn delete_rule(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM taxon_rules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(result.rows_affected() > 0)
    }
}

// ── PgClassificationStore ─────────────────────────────────────

const CLASSIFICATION_COLUMNS: &str = "id, product_id, taxon_id, position, is_automatic, created_at";

pub struct PgClassificationStore {
    pool: PgPool,
}

impl PgClassificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClassificationStore for PgClassificationStore {
    async fn get_classification(
        &self,
        product_id: Uuid,
        taxon_id: Uuid,
    ) -> Result<Option<Classification>> {
        let sql = format!(
            "SELECT {CLASSIFICATION_COLUMNS} FROM classifications \
             WHERE product_id = $1 AND taxon_id = $2"
        );
        let row = sqlx::query_as::<_, PgClassificationRow>(&sql)
            .bind(product_id)
            .bind(taxon_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(row.map(Classification::from))
    }

    async fn list_for_taxon(&self, taxon_id: Uuid) -> Result<Vec<Classification>> {
        let sql = format!(
            "SELECT {CLASSIFICATION_COLUMNS} FROM classifications \
             WHERE taxon_id = $1 ORDER BY position, created_at"
        );
        let rows = sqlx::query_as::<_, PgClassificationRow>(&sql)
            .bind(taxon_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(rows.into_iter().map(Classification::from).collect())
    }

    async fn count_for_taxon(&self, taxon_id: Uuid) -> Result<usize> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM classifications WHERE taxon_id = $1")
                .bind(taxon_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| anyhow!(e))?;
        Ok(count as usize)
    }

    async fn insert_classification(&self, c: &Classification) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO classifications (id, product_id, taxon_id, position, is_automatic, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(c.id)
        .bind(c.product_id)
        .bind(c.taxon_id)
        .bind(c.position)
        .bind(c.is_automatic)
        .bind(c.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(())
    }

    async fn update_classification(&self, c: &Classification) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE classifications SET position = $3, is_automatic = $4
            WHERE product_id = $1 AND taxon_id = $2
            "#,
        )
        .bind(c.product_id)
        .bind(c.taxon_id)
        .bind(c.position)
        .bind(c.is_automatic)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        if result.rows_affected() == 0 {
            return Err(TaxonomyError::NotFound(format!(
                "classification of product {} in taxon {}",
                c.product_id, c.taxon_id
            )));
        }
        Ok(())
    }

    async fn delete_classification(&self, product_id: Uuid, taxon_id: Uuid) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM classifications WHERE product_id = $1 AND taxon_id = $2")
                .bind(product_id)
                .bind(taxon_id)
                .execute(&self.pool)
                .await
                .map_err(|e| anyhow!(e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn replace_automatic(
        &self,
        taxon_id: Uuid,
        product_ids: &[Uuid],
    ) -> Result<AutomaticDiff> {
        let mut tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;

        // One regeneration per taxon at a time.
        let locked: Option<Uuid> = sqlx::query_scalar("SELECT id FROM taxa WHERE id = $1 FOR UPDATE")
            .bind(taxon_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| anyhow!(e))?;
        if locked.is_none() {
            return Err(TaxonomyError::not_found("taxon", taxon_id));
        }

        let sql = format!("SELECT {CLASSIFICATION_COLUMNS} FROM classifications WHERE taxon_id = $1");
        let current: Vec<Classification> = sqlx::query_as::<_, PgClassificationRow>(&sql)
            .bind(taxon_id)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| anyhow!(e))?
            .into_iter()
            .map(Classification::from)
            .collect();
        let plan = plan_automatic(&current, product_ids);

        if !plan.remove.is_empty() {
            sqlx::query(
                r#"
                DELETE FROM classifications
                WHERE taxon_id = $1 AND is_automatic AND product_id = ANY($2)
                "#,
            )
            .bind(taxon_id)
            .bind(&plan.remove)
            .execute(&mut *tx)
            .await
            .map_err(|e| anyhow!(e))?;
        }
        for &(product_id, position) in &plan.reposition {
            sqlx::query(
                r#"
                UPDATE classifications SET position = $3
                WHERE taxon_id = $1 AND product_id = $2 AND is_automatic
                "#,
            )
            .bind(taxon_id)
            .bind(product_id)
            .bind(position)
            .execute(&mut *tx)
            .await
            .map_err(|e| anyhow!(e))?;
        }
        let now = Utc::now();
        for &(product_id, position) in &plan.add {
            sqlx::query(
                r#"
                INSERT INTO classifications (id, product_id, taxon_id, position, is_automatic, created_at)
                VALUES ($1, $2, $3, $4, true, $5)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(product_id)
            .bind(taxon_id)
            .bind(position)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| anyhow!(e))?;
        }

        tx.commit().await.map_err(|e| anyhow!(e))?;
        Ok(plan.diff())
    }
}

// ── PgProductCatalog ──────────────────────────────────────────

const PRODUCT_COLUMNS: &str = "id, name, sku, price, available, tags, properties";

pub struct PgProductCatalog {
    pool: PgPool,
}

impl PgProductCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or replace a catalog product (seeding and tests).
    pub async fn upsert_product(&self, p: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, sku, price, available, tags, properties)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, sku = EXCLUDED.sku, price = EXCLUDED.price,
                available = EXCLUDED.available, tags = EXCLUDED.tags,
                properties = EXCLUDED.properties
            "#,
        )
        .bind(p.id)
        .bind(&p.name)
        .bind(&p.sku)
        .bind(p.price)
        .bind(p.available)
        .bind(&p.tags)
        .bind(sqlx::types::Json(&p.properties))
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(())
    }
}

#[async_trait]
impl ProductCatalog for PgProductCatalog {
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query_as::<_, PgProductRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(row.map(Product::from))
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name COLLATE \"C\", id");
        let rows = sqlx::query_as::<_, PgProductRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(rows.into_iter().map(Product::from).collect())
    }
}
