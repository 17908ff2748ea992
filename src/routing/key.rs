//! Shard key bounds and intervals
//!
//! Chunk boundaries are `KeyBound`s: the extremes `MinKey`/`MaxKey` plus
//! concrete values ordered by `compare_values`. A chunk owns `[min, max)`.
//! A query constrains the shard key to a `KeyInterval` whose ends may be
//! open or closed.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pipeline::{compare_values, FilterOp, Predicate};

/// A chunk boundary or interval end
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyBound {
    MinKey,
    Value(Value),
    MaxKey,
}

impl KeyBound {
    fn rank(&self) -> u8 {
        match self {
            KeyBound::MinKey => 0,
            KeyBound::Value(_) => 1,
            KeyBound::MaxKey => 2,
        }
    }
}

impl From<Value> for KeyBound {
    fn from(v: Value) -> Self {
        KeyBound::Value(v)
    }
}

impl Ord for KeyBound {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (KeyBound::Value(a), KeyBound::Value(b)) => compare_values(a, b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for KeyBound {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for KeyBound {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyBound {}

/// A possibly half-open interval of shard key values
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyInterval {
    pub lower: KeyBound,
    pub lower_inclusive: bool,
    pub upper: KeyBound,
    pub upper_inclusive: bool,
}

impl KeyInterval {
    /// Every key
    pub fn full() -> Self {
        Self {
            lower: KeyBound::MinKey,
            lower_inclusive: true,
            upper: KeyBound::MaxKey,
            upper_inclusive: true,
        }
    }

    /// Exactly one key
    pub fn point(value: Value) -> Self {
        Self {
            lower: KeyBound::Value(value.clone()),
            lower_inclusive: true,
            upper: KeyBound::Value(value),
            upper_inclusive: true,
        }
    }

    /// Intersect with all predicates on `field`; others are ignored
    pub fn from_predicates(field: &str, predicates: &[Predicate]) -> Self {
        predicates
            .iter()
            .filter(|p| p.field == field)
            .fold(Self::full(), |interval, p| interval.constrain(&p.op))
    }

    /// True when the interval is narrower than the whole key space
    pub fn is_constrained(&self) -> bool {
        *self != Self::full()
    }

    fn constrain(self, op: &FilterOp) -> Self {
        match op {
            FilterOp::Eq(v) => self
                .raise_lower(KeyBound::Value(v.clone()), true)
                .lower_upper(KeyBound::Value(v.clone()), true),
            FilterOp::Gte(v) => self.raise_lower(KeyBound::Value(v.clone()), true),
            FilterOp::Gt(v) => self.raise_lower(KeyBound::Value(v.clone()), false),
            FilterOp::Lte(v) => self.lower_upper(KeyBound::Value(v.clone()), true),
            FilterOp::Lt(v) => self.lower_upper(KeyBound::Value(v.clone()), false),
        }
    }

    fn raise_lower(mut self, bound: KeyBound, inclusive: bool) -> Self {
        match bound.cmp(&self.lower) {
            Ordering::Greater => {
                self.lower = bound;
                self.lower_inclusive = inclusive;
            }
            Ordering::Equal => self.lower_inclusive &= inclusive,
            Ordering::Less => {}
        }
        self
    }

    fn lower_upper(mut self, bound: KeyBound, inclusive: bool) -> Self {
        match bound.cmp(&self.upper) {
            Ordering::Less => {
                self.upper = bound;
                self.upper_inclusive = inclusive;
            }
            Ordering::Equal => self.upper_inclusive &= inclusive,
            Ordering::Greater => {}
        }
        self
    }

    /// True when no key can satisfy the interval
    pub fn is_empty(&self) -> bool {
        match self.lower.cmp(&self.upper) {
            Ordering::Greater => true,
            Ordering::Equal => !(self.lower_inclusive && self.upper_inclusive),
            Ordering::Less => false,
        }
    }

    /// True when some key in `[min, max)` may lie inside the interval
    pub fn overlaps(&self, min: &KeyBound, max: &KeyBound) -> bool {
        !self.is_empty() && self.clip(min, max).is_some()
    }

    /// Intersection with the half-open range `[min, max)`
    pub fn clip(&self, min: &KeyBound, max: &KeyBound) -> Option<KeyInterval> {
        let clipped = self
            .clone()
            .raise_lower(min.clone(), true)
            .lower_upper(max.clone(), false);
        if clipped.is_empty() {
            None
        } else {
            Some(clipped)
        }
    }

    /// True when `key` lies inside the interval
    pub fn contains(&self, key: &Value) -> bool {
        let key = KeyBound::Value(key.clone());
        let above = match key.cmp(&self.lower) {
            Ordering::Greater => true,
            Ordering::Equal => self.lower_inclusive,
            Ordering::Less => false,
        };
        let below = match key.cmp(&self.upper) {
            Ordering::Less => true,
            Ordering::Equal => self.upper_inclusive,
            Ordering::Greater => false,
        };
        above && below
    }
}
