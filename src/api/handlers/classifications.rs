//! Classification handlers.
//!
//! GET    /taxons/:id/classifications              - manual and automatic rows
//! POST   /taxons/:id/classifications              - manual classification
//! DELETE /taxons/:id/classifications/:product_id  - remove either kind

use std::sync::Arc;

use axum::{http::StatusCode, Extension};
use taxon_core::types::{Classification, ClassifyProduct};
use taxon_core::TaxonomyService;
use uuid::Uuid;

use crate::api::error::AppError;
use crate::api::extract::{Json, Path};

pub async fn list(
    Extension(service): Extension<Arc<TaxonomyService>>,
    Path(taxon_id): Path<Uuid>,
) -> Result<Json<Vec<Classification>>, AppError> {
    Ok(Json(service.list_classifications(taxon_id).await?))
}

pub async fn classify(
    Extension(service): Extension<Arc<TaxonomyService>>,
    Path(taxon_id): Path<Uuid>,
    Json(input): Json<ClassifyProduct>,
) -> Result<(StatusCode, Json<Classification>), AppError> {
    let row = service.classify_product(taxon_id, input).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn unclassify(
    Extension(service): Extension<Arc<TaxonomyService>>,
    Path((taxon_id, product_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    service.unclassify_product(taxon_id, product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
