//! Rule evaluation against a product.
//!
//! Text comparisons are case-insensitive. A comparison on a property the
//! product does not carry is false, whatever the operator.

use std::cmp::Ordering;

use super::ast::{CompareOp, Field, RuleExpr, Value};
use crate::types::Product;

impl RuleExpr {
    pub fn matches(&self, product: &Product) -> bool {
        match self {
            RuleExpr::And(a, b) => a.matches(product) && b.matches(product),
            RuleExpr::Or(a, b) => a.matches(product) || b.matches(product),
            RuleExpr::Not(e) => !e.matches(product),
            RuleExpr::Compare { field, op, value } => compare(product, field, *op, value),
        }
    }
}

fn compare(product: &Product, field: &Field, op: CompareOp, value: &Value) -> bool {
    match (field, value) {
        (Field::Name, Value::Text(needle)) => text(&product.name, op, needle),
        (Field::Sku, Value::Text(needle)) => text(&product.sku, op, needle),
        (Field::Property(key), Value::Text(needle)) => product
            .properties
            .get(key)
            .is_some_and(|v| text(v, op, needle)),
        // `tag != x` holds when no tag equals x.
        (Field::Tag, Value::Text(needle)) => match op {
            CompareOp::Ne => !product
                .tags
                .iter()
                .any(|t| text(t, CompareOp::Eq, needle)),
            _ => product.tags.iter().any(|t| text(t, op, needle)),
        },
        (Field::Price, Value::Number(n)) => ordering(product.price.cmp(n), op),
        (Field::Available, Value::Bool(b)) => match op {
            CompareOp::Eq => product.available == *b,
            CompareOp::Ne => product.available != *b,
            _ => false,
        },
        // Ill-typed comparisons never survive parsing.
        _ => false,
    }
}

fn text(actual: &str, op: CompareOp, expected: &str) -> bool {
    let actual = actual.to_lowercase();
    let expected = expected.to_lowercase();
    match op {
        CompareOp::Eq => actual == expected,
        CompareOp::Ne => actual != expected,
        CompareOp::Contains => actual.contains(&expected),
        CompareOp::StartsWith => actual.starts_with(&expected),
        _ => false,
    }
}

fn ordering(ord: Ordering, op: CompareOp) -> bool {
    match op {
        CompareOp::Eq => ord == Ordering::Equal,
        CompareOp::Ne => ord != Ordering::Equal,
        CompareOp::Lt => ord == Ordering::Less,
        CompareOp::Le => ord != Ordering::Greater,
        CompareOp::Gt => ord == Ordering::Greater,
        CompareOp::Ge => ord != Ordering::Less,
        CompareOp::Contains | CompareOp::StartsWith => false,
    }
}
