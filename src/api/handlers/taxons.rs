//! Taxon handlers.
//!
//! GET    /taxons                 - flat paged list (query-string filters)
//! POST   /taxons                 - create under a parent
//! GET    /taxons/:id             - taxon with breadcrumbs, rules and counts
//! PATCH  /taxons/:id             - rename, reslug, describe, change policy
//! DELETE /taxons/:id?policy=     - `restrict` (default) or `reparent`
//! POST   /taxons/:id/move        - reparent and/or reorder
//! POST   /taxons/:id/regenerate  - re-run the taxon's rules

use std::sync::Arc;

use axum::{http::StatusCode, Extension};
use serde::Deserialize;
use taxon_core::projection::{PagedList, TaxonListItem, TaxonQuery};
use taxon_core::types::{
    DeletePolicy, MoveTaxon, NewTaxon, RegenerationSummary, Taxon, TaxonDetail, TaxonPatch,
};
use taxon_core::TaxonomyService;
use uuid::Uuid;

use crate::api::error::AppError;
use crate::api::extract::{Json, Path, Query};

#[derive(Debug, Default, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub policy: DeletePolicy,
}

pub async fn list(
    Extension(service): Extension<Arc<TaxonomyService>>,
    Query(query): Query<TaxonQuery>,
) -> Result<Json<PagedList<TaxonListItem>>, AppError> {
    Ok(Json(service.get_flat_taxons(query).await?))
}

pub async fn create(
    Extension(service): Extension<Arc<TaxonomyService>>,
    Json(input): Json<NewTaxon>,
) -> Result<(StatusCode, Json<Taxon>), AppError> {
    let taxon = service.create_taxon(input).await?;
    Ok((StatusCode::CREATED, Json(taxon)))
}

pub async fn get(
    Extension(service): Extension<Arc<TaxonomyService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TaxonDetail>, AppError> {
    Ok(Json(service.get_taxon(id).await?))
}

pub async fn update(
    Extension(service): Extension<Arc<TaxonomyService>>,
    Path(id): Path<Uuid>,
    Json(patch): Json<TaxonPatch>,
) -> Result<Json<Taxon>, AppError> {
    Ok(Json(service.update_taxon(id, patch).await?))
}

pub async fn delete(
    Extension(service): Extension<Arc<TaxonomyService>>,
    Path(id): Path<Uuid>,
    Query(params): Query<DeleteParams>,
) -> Result<StatusCode, AppError> {
    service.delete_taxon(id, params.policy).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn move_taxon(
    Extension(service): Extension<Arc<TaxonomyService>>,
    Path(id): Path<Uuid>,
    Json(input): Json<MoveTaxon>,
) -> Result<Json<Taxon>, AppError> {
    Ok(Json(service.move_taxon(id, input).await?))
}

pub async fn regenerate(
    Extension(service): Extension<Arc<TaxonomyService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RegenerationSummary>, AppError> {
    Ok(Json(service.regenerate_products_for_taxon(id).await?))
}
