//! Taxonomy handlers.
//!
//! GET    /taxonomies               - list taxonomies
//! POST   /taxonomies               - create a taxonomy and its root taxon
//! GET    /taxonomies/:id           - taxonomy with its root
//! PATCH  /taxonomies/:id           - rename (root follows)
//! DELETE /taxonomies/:id           - delete the whole tree
//! GET    /taxonomies/:id/tree      - nested tree, optional focus and depth
//! POST   /taxonomies/:id/validate  - check the parent graph
//! POST   /taxonomies/:id/rebuild   - recompute depth, path and pretty names

use std::sync::Arc;

use axum::{http::StatusCode, Extension};
use serde::{Deserialize, Serialize};
use taxon_core::projection::{TreeQuery, TreeResponse};
use taxon_core::types::{NewTaxonomy, RebuildSummary, Taxonomy, TaxonomyDetail};
use taxon_core::TaxonomyService;
use uuid::Uuid;

use crate::api::error::AppError;
use crate::api::extract::{Json, Path, Query};

#[derive(Debug, Deserialize)]
pub struct RenameTaxonomy {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TreeParams {
    #[serde(default)]
    pub focus: Option<Uuid>,
    #[serde(default)]
    pub max_depth: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidationReport {
    pub taxonomy_id: Uuid,
    pub valid: bool,
}

pub async fn list(
    Extension(service): Extension<Arc<TaxonomyService>>,
) -> Result<Json<Vec<Taxonomy>>, AppError> {
    Ok(Json(service.list_taxonomies().await?))
}

pub async fn create(
    Extension(service): Extension<Arc<TaxonomyService>>,
    Json(input): Json<NewTaxonomy>,
) -> Result<(StatusCode, Json<TaxonomyDetail>), AppError> {
    let detail = service.create_taxonomy(input).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn get(
    Extension(service): Extension<Arc<TaxonomyService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TaxonomyDetail>, AppError> {
    Ok(Json(service.get_taxonomy(id).await?))
}

pub async fn rename(
    Extension(service): Extension<Arc<TaxonomyService>>,
    Path(id): Path<Uuid>,
    Json(input): Json<RenameTaxonomy>,
) -> Result<Json<TaxonomyDetail>, AppError> {
    Ok(Json(service.rename_taxonomy(id, &input.name).await?))
}

pub async fn delete(
    Extension(service): Extension<Arc<TaxonomyService>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    service.delete_taxonomy(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn tree(
    Extension(service): Extension<Arc<TaxonomyService>>,
    Path(id): Path<Uuid>,
    Query(params): Query<TreeParams>,
) -> Result<Json<TreeResponse>, AppError> {
    let query = TreeQuery {
        taxonomy_id: id,
        focus: params.focus,
        max_depth: params.max_depth,
    };
    Ok(Json(service.build_taxon_tree(query).await?))
}

/// A broken hierarchy is reported through the error envelope (422).
pub async fn validate(
    Extension(service): Extension<Arc<TaxonomyService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ValidationReport>, AppError> {
    service.validate_hierarchy(id).await?;
    Ok(Json(ValidationReport {
        taxonomy_id: id,
        valid: true,
    }))
}

pub async fn rebuild(
    Extension(service): Extension<Arc<TaxonomyService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RebuildSummary>, AppError> {
    Ok(Json(service.rebuild_hierarchy(id).await?))
}
