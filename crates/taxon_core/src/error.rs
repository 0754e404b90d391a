use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Structured violation codes.
///
/// Format: `{AREA}.{REASON}`, stable across releases (clients match on them).
pub mod codes {
    /// A `parent_id` references a taxon that is missing or lives in another taxonomy.
    pub const HIERARCHY_INVALID_PARENT: &str = "hierarchy.invalid_parent";
    /// The parent graph contains a cycle.
    pub const HIERARCHY_CYCLE: &str = "hierarchy.cycle";
    /// A taxon sits deeper than the configured maximum depth.
    pub const HIERARCHY_DEPTH_EXCEEDED: &str = "hierarchy.depth_exceeded";

    pub const TAXONOMY_NAME_EMPTY: &str = "taxonomy.name_empty";
    pub const TAXONOMY_NAME_TAKEN: &str = "taxonomy.name_taken";

    pub const TAXON_NAME_EMPTY: &str = "taxon.name_empty";
    pub const TAXON_NAME_TOO_LONG: &str = "taxon.name_too_long";
    pub const TAXON_SLUG_INVALID: &str = "taxon.slug_invalid";
    pub const TAXON_SLUG_TAKEN: &str = "taxon.slug_taken";
    pub const TAXON_POSITION_NEGATIVE: &str = "taxon.position_negative";
    pub const TAXON_ROOT_IMMUTABLE: &str = "taxon.root_immutable";
    pub const TAXON_HAS_CHILDREN: &str = "taxon.has_children";

    pub const RULE_MALFORMED: &str = "rule.malformed";

    pub const CLASSIFICATION_EXISTS: &str = "classification.exists";
}

#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {} violation(s)", .0.len())]
    Validation(Vec<Violation>),

    #[error("failure: {0}")]
    Failure(#[from] anyhow::Error),
}

impl TaxonomyError {
    pub fn not_found(kind: &str, id: Uuid) -> Self {
        Self::NotFound(format!("{kind} {id}"))
    }

    /// Single-violation validation error.
    pub fn invalid(violation: Violation) -> Self {
        Self::Validation(vec![violation])
    }

    pub fn name_taken(name: &str) -> Self {
        Self::invalid(Violation::new(
            codes::TAXONOMY_NAME_TAKEN,
            format!("a taxonomy named '{name}' already exists"),
        ))
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Validation(_) => 422,
            Self::Failure(_) => 500,
        }
    }

    /// Short human title used in the HTTP error envelope.
    pub fn title(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "Not Found",
            Self::Validation(_) => "Validation Failed",
            Self::Failure(_) => "Internal Failure",
        }
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Validation(v) => v,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taxon_id: Option<Uuid>,
}

impl Violation {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            taxon_id: None,
        }
    }

    pub fn on(mut self, taxon_id: Uuid) -> Self {
        self.taxon_id = Some(taxon_id);
        self
    }

    pub fn invalid_parent(taxon_id: Uuid, parent_id: Uuid) -> Self {
        Self::new(
            codes::HIERARCHY_INVALID_PARENT,
            format!("taxon {taxon_id} references parent {parent_id} outside its taxonomy"),
        )
        .on(taxon_id)
    }

    /// `members` lists the cycle in parent-walk order, starting at the first
    /// node revisited.
    pub fn cycle(members: &[Uuid]) -> Self {
        let chain = members
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(" -> ");
        let mut v = Self::new(codes::HIERARCHY_CYCLE, format!("cycle detected: {chain}"));
        v.taxon_id = members.first().copied();
        v
    }

    pub fn depth_exceeded(taxon_id: Uuid, depth: u32, max_depth: u32) -> Self {
        Self::new(
            codes::HIERARCHY_DEPTH_EXCEEDED,
            format!("taxon {taxon_id} at depth {depth} exceeds maximum depth {max_depth}"),
        )
        .on(taxon_id)
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

pub type Result<T> = std::result::Result<T, TaxonomyError>;
