//! Rule-driven automatic classification.
//!
//! Pure planning half of `TaxonomyService::regenerate_products_for_taxon`:
//! parse a taxon's stored rules, pick the products that satisfy them under
//! the taxon's [`MatchPolicy`], and plan the row changes that
//! [`crate::ports::ClassificationStore::replace_automatic`] applies.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::error::{codes, TaxonomyError, Violation};
use crate::rules::{parse_rule, RuleExpr};
use crate::types::{AutomaticDiff, Classification, MatchPolicy, Product, TaxonRule};

/// Parse every stored rule. A rule that no longer parses fails the whole
/// regeneration; every malformed rule is reported.
pub fn compile_rules(taxon_id: Uuid, rules: &[TaxonRule]) -> Result<Vec<RuleExpr>, TaxonomyError> {
    let mut compiled = Vec::with_capacity(rules.len());
    let mut violations = Vec::new();
    for rule in rules {
        match parse_rule(&rule.expression) {
            Ok(expr) => compiled.push(expr),
            Err(e) => violations.push(
                Violation::new(
                    codes::RULE_MALFORMED,
                    format!("rule {} `{}`: {e}", rule.id, rule.expression),
                )
                .on(taxon_id),
            ),
        }
    }
    if violations.is_empty() {
        Ok(compiled)
    } else {
        Err(TaxonomyError::Validation(violations))
    }
}

/// Ids of the products matching `rules` under `policy`, ordered by product
/// name then id. No rules means no products.
pub fn select_products(rules: &[RuleExpr], policy: MatchPolicy, products: &[Product]) -> Vec<Uuid> {
    if rules.is_empty() {
        return Vec::new();
    }
    let mut hits: Vec<&Product> = products
        .iter()
        .filter(|p| match policy {
            MatchPolicy::All => rules.iter().all(|r| r.matches(p)),
            MatchPolicy::Any => rules.iter().any(|r| r.matches(p)),
        })
        .collect();
    hits.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    hits.into_iter().map(|p| p.id).collect()
}

/// Row changes that make a taxon's automatic classifications match a
/// selection. Manual rows never appear in a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutomaticPlan {
    /// Products whose automatic row is deleted.
    pub remove: Vec<Uuid>,
    /// `(product_id, position)` of kept automatic rows whose position changes.
    pub reposition: Vec<(Uuid, i32)>,
    /// `(product_id, position)` of new automatic rows.
    pub add: Vec<(Uuid, i32)>,
}

impl AutomaticPlan {
    pub fn diff(&self) -> AutomaticDiff {
        AutomaticDiff {
            added: self.add.len(),
            removed: self.remove.len(),
        }
    }
}

/// Plan the replacement of the automatic rows in `current` (all rows of one
/// taxon) by `product_ids`, in that order.
///
/// Products with a manual row are skipped. Automatic rows are numbered
/// after the highest manual position.
pub fn plan_automatic(current: &[Classification], product_ids: &[Uuid]) -> AutomaticPlan {
    let manual: HashSet<Uuid> = current
        .iter()
        .filter(|c| !c.is_automatic)
        .map(|c| c.product_id)
        .collect();
    let base = current
        .iter()
        .filter(|c| !c.is_automatic)
        .map(|c| c.position + 1)
        .max()
        .unwrap_or(0);
    let automatic: HashMap<Uuid, i32> = current
        .iter()
        .filter(|c| c.is_automatic)
        .map(|c| (c.product_id, c.position))
        .collect();

    let mut plan = AutomaticPlan::default();
    let mut wanted = HashSet::new();
    let mut slot = base;
    for &product_id in product_ids {
        if manual.contains(&product_id) || !wanted.insert(product_id) {
            continue;
        }
        match automatic.get(&product_id) {
            Some(&position) if position == slot => {}
            Some(_) => plan.reposition.push((product_id, slot)),
            None => plan.add.push((product_id, slot)),
        }
        slot += 1;
    }
    plan.remove = current
        .iter()
        .filter(|c| c.is_automatic && !wanted.contains(&c.product_id))
        .map(|c| c.product_id)
        .collect();
    plan
}
