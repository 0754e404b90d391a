//! Rule handlers.
//!
//! GET    /taxons/:id/rules - rules of a taxon in creation order
//! POST   /taxons/:id/rules - attach a rule (parsed before it is stored)
//! DELETE /rules/:id        - detach a rule

use std::sync::Arc;

use axum::{http::StatusCode, Extension};
use taxon_core::types::{NewRule, TaxonRule};
use taxon_core::TaxonomyService;
use uuid::Uuid;

use crate::api::error::AppError;
use crate::api::extract::{Json, Path};

pub async fn list(
    Extension(service): Extension<Arc<TaxonomyService>>,
    Path(taxon_id): Path<Uuid>,
) -> Result<Json<Vec<TaxonRule>>, AppError> {
    Ok(Json(service.list_rules(taxon_id).await?))
}

pub async fn add(
    Extension(service): Extension<Arc<TaxonomyService>>,
    Path(taxon_id): Path<Uuid>,
    Json(input): Json<NewRule>,
) -> Result<(StatusCode, Json<TaxonRule>), AppError> {
    let rule = service.add_rule(taxon_id, input).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

pub async fn remove(
    Extension(service): Extension<Arc<TaxonomyService>>,
    Path(rule_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    service.remove_rule(rule_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
