//! Predicate filtering and field access
//!
//! Exact match only, no type coercion: a range predicate only matches a value
//! of the same type as its operand.

use serde_json::Value;

use super::compare::{compare_values, values_equal};
use super::stage::{FilterOp, Predicate};

/// Resolves a dotted field path inside a document
pub fn lookup_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |current, part| current.get(part))
}

/// Evaluates predicates against documents
pub struct PredicateFilter;

impl PredicateFilter {
    /// Checks if a document matches all predicates
    pub fn matches(document: &Value, predicates: &[Predicate]) -> bool {
        predicates
            .iter()
            .all(|pred| Self::matches_predicate(document, pred))
    }

    fn matches_predicate(document: &Value, predicate: &Predicate) -> bool {
        let field_value = match lookup_path(document, &predicate.field) {
            Some(v) => v,
            None => return matches!(&predicate.op, FilterOp::Eq(Value::Null)),
        };

        match &predicate.op {
            FilterOp::Eq(expected) => values_equal(field_value, expected),
            FilterOp::Gte(bound) => Self::range_match(field_value, bound, |o| o.is_ge()),
            FilterOp::Gt(bound) => Self::range_match(field_value, bound, |o| o.is_gt()),
            FilterOp::Lte(bound) => Self::range_match(field_value, bound, |o| o.is_le()),
            FilterOp::Lt(bound) => Self::range_match(field_value, bound, |o| o.is_lt()),
        }
    }

    fn range_match(
        actual: &Value,
        bound: &Value,
        accept: impl Fn(std::cmp::Ordering) -> bool,
    ) -> bool {
        let comparable = matches!(
            (actual, bound),
            (Value::Number(_), Value::Number(_)) | (Value::String(_), Value::String(_))
        );
        comparable && accept(compare_values(actual, bound))
    }
}
