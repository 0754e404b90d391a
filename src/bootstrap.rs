//! Store selection and service construction.

use std::sync::Arc;

use taxon_core::memory::MemoryStore;
use taxon_core::TaxonomyService;

use crate::config::AppConfig;

/// Which store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Memory,
    Postgres,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Memory => "memory",
            Backend::Postgres => "postgres",
        }
    }
}

/// Postgres when `database_url` is set (schema applied on connect),
/// otherwise a fresh in-memory store.
pub async fn build_service(config: &AppConfig) -> anyhow::Result<(Arc<TaxonomyService>, Backend)> {
    let (service, backend) = match config.database_url.as_deref() {
        #[cfg(feature = "database")]
        Some(url) => {
            use sqlx::postgres::PgPoolOptions;

            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect(url)
                .await?;
            tracing::info!("Connected to database");
            taxon_postgres::migrate(&pool).await?;
            (
                taxon_postgres::PgStores::new(pool).service(),
                Backend::Postgres,
            )
        }
        #[cfg(not(feature = "database"))]
        Some(_) => anyhow::bail!("TAXON_DATABASE_URL is set but the `database` feature is off"),
        None => (
            TaxonomyService::in_memory(Arc::new(MemoryStore::new())),
            Backend::Memory,
        ),
    };

    let service = service
        .with_limits(config.limits())
        .with_default_page_size(config.default_page_size);
    tracing::info!(backend = backend.name(), "taxonomy service ready");
    Ok((Arc::new(service), backend))
}
