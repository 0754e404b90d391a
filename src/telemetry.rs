//! Tracing setup shared by the binaries.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str =
    "info,taxon_core=debug,taxon_postgres=debug,taxon_hierarchy=debug,tower_http=info";

/// Install the global subscriber. `RUST_LOG` overrides [`DEFAULT_FILTER`].
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .compact()
        .try_init();
}
