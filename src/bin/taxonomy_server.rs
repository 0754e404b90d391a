//! taxonomy_server: REST server for taxonomy hierarchies.
//!
//! Configuration comes from the environment (see `taxon_hierarchy::config`):
//!   TAXON_DATABASE_URL  Postgres connection string (unset: in-memory store)
//!   TAXON_BIND_ADDR     listen address (default: 0.0.0.0:4200)

use tokio::net::TcpListener;

use taxon_hierarchy::api::build_router;
use taxon_hierarchy::bootstrap::{build_service, Backend};
use taxon_hierarchy::telemetry::init_tracing;
use taxon_hierarchy::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env()?;
    let (service, backend) = build_service(&config).await?;
    if backend == Backend::Memory {
        tracing::warn!("TAXON_DATABASE_URL not set; data lives only as long as this process");
    }

    let app = build_router(service);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("taxonomy_server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
