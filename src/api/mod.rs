//! axum HTTP surface over [`TaxonomyService`].

pub mod error;
pub mod extract;
pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Extension, Router,
};
use taxon_core::TaxonomyService;
use tower_http::trace::TraceLayer;

pub use error::{AppError, ErrorEnvelope};

/// Build the full router. The service is shared through an `Extension`.
pub fn build_router(service: Arc<TaxonomyService>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        // Taxonomies
        .route(
            "/taxonomies",
            get(handlers::taxonomies::list).post(handlers::taxonomies::create),
        )
        .route(
            "/taxonomies/:id",
            get(handlers::taxonomies::get)
                .patch(handlers::taxonomies::rename)
                .delete(handlers::taxonomies::delete),
        )
        .route("/taxonomies/:id/tree", get(handlers::taxonomies::tree))
        .route(
            "/taxonomies/:id/validate",
            post(handlers::taxonomies::validate),
        )
        .route(
            "/taxonomies/:id/rebuild",
            post(handlers::taxonomies::rebuild),
        )
        // Taxa
        .route(
            "/taxons",
            get(handlers::taxons::list).post(handlers::taxons::create),
        )
        .route(
            "/taxons/:id",
            get(handlers::taxons::get)
                .patch(handlers::taxons::update)
                .delete(handlers::taxons::delete),
        )
        .route("/taxons/:id/move", post(handlers::taxons::move_taxon))
        .route(
            "/taxons/:id/regenerate",
            post(handlers::taxons::regenerate),
        )
        // Rules
        .route(
            "/taxons/:id/rules",
            get(handlers::rules::list).post(handlers::rules::add),
        )
        .route("/rules/:id", delete(handlers::rules::remove))
        // Classifications
        .route(
            "/taxons/:id/classifications",
            get(handlers::classifications::list).post(handlers::classifications::classify),
        )
        .route(
            "/taxons/:id/classifications/:product_id",
            delete(handlers::classifications::unclassify),
        )
        .layer(TraceLayer::new_for_http())
        .layer(Extension(service))
}
