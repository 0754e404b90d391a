//! nom parser for the rule language.
//!
//! Precedence, loosest first: `or`, `and`, `not`, comparison. Keywords are
//! case-insensitive. Parsing is followed by a type pass ([`check`]) so the
//! evaluator never sees `price contains "x"` or `available > true`.

use std::str::FromStr;

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, tag, tag_no_case, take_while1},
    character::complete::{char, digit1, multispace0, none_of, satisfy},
    combinator::{all_consuming, cut, map, map_res, not, opt, recognize, value},
    error::{context, VerboseError, VerboseErrorKind},
    multi::many0,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use rust_decimal::Decimal;
use thiserror::Error;

use super::ast::{CompareOp, Field, RuleExpr, Value};

type Res<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

/// Longest rule source accepted, in bytes.
pub const MAX_RULE_LEN: usize = 4096;

/// Deepest stack of `not` prefixes and parentheses accepted.
pub const MAX_NESTING: usize = 64;

const TOO_DEEP: &str = "nesting limit";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleParseError {
    #[error("rule expression is empty")]
    Empty,
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("type error: {0}")]
    Type(String),
}

// ============================================================================
// Public API
// ============================================================================

/// Parse and type-check a rule expression.
pub fn parse_rule(input: &str) -> Result<RuleExpr, RuleParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(RuleParseError::Empty);
    }
    if trimmed.len() > MAX_RULE_LEN {
        return Err(RuleParseError::Syntax(format!(
            "rule is longer than {MAX_RULE_LEN} bytes"
        )));
    }
    let expr = match all_consuming(ws(|i| or_expr(i, 0)))(trimmed) {
        Ok((_, expr)) => expr,
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let too_deep = e
                .errors
                .iter()
                .any(|(_, kind)| matches!(kind, VerboseErrorKind::Context(c) if *c == TOO_DEEP));
            if too_deep {
                return Err(RuleParseError::Syntax(format!(
                    "nesting too deep (more than {MAX_NESTING} levels)"
                )));
            }
            return Err(RuleParseError::Syntax(nom::error::convert_error(trimmed, e)));
        }
        Err(nom::Err::Incomplete(_)) => {
            return Err(RuleParseError::Syntax("incomplete input".to_string()))
        }
    };
    check(&expr)?;
    Ok(expr)
}

// ============================================================================
// Type pass
// ============================================================================

fn check(expr: &RuleExpr) -> Result<(), RuleParseError> {
    match expr {
        RuleExpr::And(a, b) | RuleExpr::Or(a, b) => {
            check(a)?;
            check(b)
        }
        RuleExpr::Not(e) => check(e),
        RuleExpr::Compare { field, op, value } => {
            let ok = match (field, value) {
                (Field::Price, Value::Number(_)) => !op.is_textual(),
                (Field::Available, Value::Bool(_)) => matches!(op, CompareOp::Eq | CompareOp::Ne),
                (Field::Name | Field::Sku | Field::Tag | Field::Property(_), Value::Text(_)) => {
                    !op.is_ordering()
                }
                _ => false,
            };
            if ok {
                Ok(())
            } else {
                Err(RuleParseError::Type(format!(
                    "`{field} {op} {value}` is not a valid comparison"
                )))
            }
        }
    }
}

// ============================================================================
// Combinators
// ============================================================================

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> Res<'a, O>
where
    F: FnMut(&'a str) -> Res<'a, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// Case-insensitive keyword not followed by an identifier character.
fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> Res<'a, &'a str> {
    terminated(tag_no_case(kw), not(satisfy(is_ident_char)))
}

// ============================================================================
// Expressions
// ============================================================================

fn or_expr<'a>(input: &'a str, depth: usize) -> Res<'a, RuleExpr> {
    let (input, first) = and_expr(input, depth)?;
    let (input, rest) =
        many0(preceded(ws(keyword("or")), cut(|i: &'a str| and_expr(i, depth))))(input)?;
    let expr = rest
        .into_iter()
        .fold(first, |acc, e| RuleExpr::Or(Box::new(acc), Box::new(e)));
    Ok((input, expr))
}

fn and_expr<'a>(input: &'a str, depth: usize) -> Res<'a, RuleExpr> {
    let (input, first) = unary(input, depth)?;
    let (input, rest) =
        many0(preceded(ws(keyword("and")), cut(|i: &'a str| unary(i, depth))))(input)?;
    let expr = rest
        .into_iter()
        .fold(first, |acc, e| RuleExpr::And(Box::new(acc), Box::new(e)));
    Ok((input, expr))
}

fn unary<'a>(input: &'a str, depth: usize) -> Res<'a, RuleExpr> {
    ws(alt((
        |i: &'a str| negation(i, depth),
        |i: &'a str| parenthesised(i, depth),
        comparison,
    )))(input)
}

/// Depth for the operand of a `not` or `(`; fails hard past [`MAX_NESTING`].
fn deeper(input: &str, depth: usize) -> Result<usize, nom::Err<VerboseError<&str>>> {
    if depth >= MAX_NESTING {
        return Err(nom::Err::Failure(VerboseError {
            errors: vec![(input, VerboseErrorKind::Context(TOO_DEEP))],
        }));
    }
    Ok(depth + 1)
}

fn negation<'a>(input: &'a str, depth: usize) -> Res<'a, RuleExpr> {
    let (input, _) = keyword("not")(input)?;
    let depth = deeper(input, depth)?;
    let (input, inner) = cut(|i: &'a str| unary(i, depth))(input)?;
    Ok((input, RuleExpr::Not(Box::new(inner))))
}

fn parenthesised<'a>(input: &'a str, depth: usize) -> Res<'a, RuleExpr> {
    let (input, _) = char('(')(input)?;
    let depth = deeper(input, depth)?;
    let (input, inner) = cut(ws(|i: &'a str| or_expr(i, depth)))(input)?;
    let (input, _) = cut(context("closing parenthesis", char(')')))(input)?;
    Ok((input, inner))
}

fn comparison(input: &str) -> Res<'_, RuleExpr> {
    let (input, field) = context("field", field)(input)?;
    let (input, op) = cut(context("operator", ws(compare_op)))(input)?;
    let (input, value) = cut(context("value", literal))(input)?;
    Ok((input, RuleExpr::Compare { field, op, value }))
}

// ============================================================================
// Terminals
// ============================================================================

fn field(input: &str) -> Res<'_, Field> {
    alt((
        map(
            preceded(tag_no_case("property."), take_while1(is_ident_char)),
            |key: &str| Field::Property(key.to_string()),
        ),
        value(Field::Name, keyword("name")),
        value(Field::Sku, keyword("sku")),
        value(Field::Price, keyword("price")),
        value(Field::Available, keyword("available")),
        value(Field::Tag, keyword("tag")),
    ))(input)
}

fn compare_op(input: &str) -> Res<'_, CompareOp> {
    alt((
        value(CompareOp::Le, tag("<=")),
        value(CompareOp::Ge, tag(">=")),
        value(CompareOp::Ne, tag("!=")),
        value(CompareOp::Eq, tag("==")),
        value(CompareOp::Eq, tag("=")),
        value(CompareOp::Lt, tag("<")),
        value(CompareOp::Gt, tag(">")),
        value(CompareOp::Contains, keyword("contains")),
        value(CompareOp::StartsWith, keyword("starts_with")),
    ))(input)
}

fn literal(input: &str) -> Res<'_, Value> {
    alt((
        map(string_literal, Value::Text),
        map(number, Value::Number),
        value(Value::Bool(true), keyword("true")),
        value(Value::Bool(false), keyword("false")),
    ))(input)
}

fn string_literal(input: &str) -> Res<'_, String> {
    alt((
        value(String::new(), tag("\"\"")),
        delimited(
            char('"'),
            escaped_transform(
                none_of("\\\""),
                '\\',
                alt((
                    value("\\", tag("\\")),
                    value("\"", tag("\"")),
                    value("\n", tag("n")),
                )),
            ),
            cut(char('"')),
        ),
    ))(input)
}

fn number(input: &str) -> Res<'_, Decimal> {
    map_res(
        recognize(tuple((
            opt(char('-')),
            digit1,
            opt(pair(char('.'), digit1)),
        ))),
        Decimal::from_str,
    )(input)
}
