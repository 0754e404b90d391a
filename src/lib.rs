//! Taxonomy hierarchy manager.
//!
//! Wires the pure `taxon_core` service to a store (in-memory or Postgres),
//! reads configuration from the environment and exposes the HTTP API.

pub mod bootstrap;
pub mod config;
pub mod telemetry;

#[cfg(feature = "server")]
pub mod api;

pub use config::{AppConfig, ConfigError};
pub use taxon_core::{TaxonomyError, TaxonomyService};
