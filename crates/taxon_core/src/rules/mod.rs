//! Taxon rule language.
//!
//! A rule is a boolean predicate over a [`crate::types::Product`]:
//!
//! ```text
//! name contains "shirt" and (price < 50 or tag = "sale") and not available = false
//! property.color = "red" or sku starts_with "TS-"
//! ```
//!
//! [`parse_rule`] turns source text into a typed [`RuleExpr`]; type errors
//! (e.g. `price contains "x"`) are rejected at parse time so evaluation is
//! total.

mod ast;
mod eval;
mod parser;

pub use ast::{CompareOp, Field, RuleExpr, Value};
pub use parser::{parse_rule, RuleParseError, MAX_NESTING, MAX_RULE_LEN};
