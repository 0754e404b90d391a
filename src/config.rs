//! Environment configuration.
//!
//! | Variable | Default |
//! |---|---|
//! | `TAXON_DATABASE_URL` | unset: in-memory store |
//! | `TAXON_BIND_ADDR` | `0.0.0.0:4200` |
//! | `TAXON_DB_MAX_CONNECTIONS` | `10` |
//! | `TAXON_MAX_DEPTH` | unset: no depth limit |
//! | `TAXON_DEFAULT_PAGE_SIZE` | `20` |

use std::str::FromStr;

use taxon_core::hierarchy::HierarchyLimits;
use taxon_core::projection::DEFAULT_PAGE_SIZE;
use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:4200";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: cannot parse '{value}' as {expected}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("{var} must be greater than zero")]
    Zero { var: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub max_depth: Option<u32>,
    pub default_page_size: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            db_max_connections: DEFAULT_MAX_CONNECTIONS,
            max_depth: None,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl AppConfig {
    /// Read the process environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let db_max_connections = parse_positive(
            "TAXON_DB_MAX_CONNECTIONS",
            get("TAXON_DB_MAX_CONNECTIONS"),
        )?
        .unwrap_or(defaults.db_max_connections);
        let default_page_size =
            parse_positive("TAXON_DEFAULT_PAGE_SIZE", get("TAXON_DEFAULT_PAGE_SIZE"))?
                .unwrap_or(defaults.default_page_size);
        let max_depth = parse::<u32>("TAXON_MAX_DEPTH", get("TAXON_MAX_DEPTH"), "u32")?;

        Ok(Self {
            database_url: get("TAXON_DATABASE_URL"),
            bind_addr: get("TAXON_BIND_ADDR").unwrap_or(defaults.bind_addr),
            db_max_connections,
            max_depth,
            default_page_size,
        })
    }

    pub fn limits(&self) -> HierarchyLimits {
        HierarchyLimits {
            max_depth: self.max_depth,
        }
    }
}

fn parse<T: FromStr>(
    var: &'static str,
    value: Option<String>,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    value
        .map(|v| {
            v.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
                var,
                value: v.clone(),
                expected,
            })
        })
        .transpose()
}

fn parse_positive(var: &'static str, value: Option<String>) -> Result<Option<u32>, ConfigError> {
    match parse::<u32>(var, value, "positive integer")? {
        Some(0) => Err(ConfigError::Zero { var }),
        other => Ok(other),
    }
}
