//! Taxonomy hierarchy core.
//!
//! Pure domain logic for classification trees: taxonomies own a forest of
//! taxa addressed by `Uuid` keys with an explicit `parent_id`. Storage is
//! reached only through the port traits in [`ports`]; `taxon_postgres`
//! implements them with sqlx and [`memory::MemoryStore`] implements them
//! in-process.
//!
//! ```text
//! TaxonomyService ──► ports::{TaxonomyStore, RuleStore, ClassificationStore, ProductCatalog}
//!       │
//!       ├── hierarchy  (validate / rebuild / structural edits, all pure)
//!       ├── projection (flat paged list, tree with breadcrumbs)
//!       ├── rules      (rule language: parse + evaluate)
//!       └── regeneration (rule-driven automatic classification)
//! ```

pub mod error;
pub mod hierarchy;
pub mod memory;
pub mod ports;
pub mod projection;
pub mod regeneration;
pub mod rules;
pub mod service;
pub mod slug;
pub mod types;

pub use error::{TaxonomyError, Violation};
pub use service::TaxonomyService;
