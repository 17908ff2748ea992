//! Grouping on the merger
//!
//! Two modes:
//! - `Full`: raw documents in, group key and accumulator inputs evaluated
//!   from the group specification
//! - `Merging`: partial groups from shards in, keyed by `_id`, each
//!   accumulator read from its own output field and combined
//!
//! Output order is first appearance of each group key.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde_json::{Map, Number, Value};

use crate::pipeline::{
    compare_values, values_equal, Accumulator, AccumulatorOp, Document, GroupSpec, ValueExpr,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupMode {
    Full,
    Merging,
}

#[derive(Debug)]
struct GroupState {
    id: Value,
    values: Vec<Option<Value>>,
}

/// Accumulates documents into groups
#[derive(Debug)]
pub struct GroupProcessor {
    id: ValueExpr,
    accumulators: Vec<Accumulator>,
    mode: GroupMode,
    groups: Vec<GroupState>,
    index: HashMap<String, usize>,
}

impl GroupProcessor {
    pub fn new(spec: &GroupSpec, mode: GroupMode) -> Self {
        let (id, accumulators) = match mode {
            GroupMode::Full => (spec.id.clone(), spec.accumulators.clone()),
            GroupMode::Merging => (
                ValueExpr::Field("_id".into()),
                spec.accumulators
                    .iter()
                    .map(|acc| Accumulator::new(acc.name.clone(), acc.op, ValueExpr::Field(acc.name.clone())))
                    .collect(),
            ),
        };
        Self {
            id,
            accumulators,
            mode,
            groups: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn mode(&self) -> GroupMode {
        self.mode
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn process(&mut self, doc: &Document) {
        let id = self.id.evaluate(doc);
        let key = group_key(&id);

        let slot = match self.index.entry(key) {
            Entry::Occupied(e) => *e.get(),
            Entry::Vacant(e) => {
                self.groups.push(GroupState {
                    id,
                    values: vec![None; self.accumulators.len()],
                });
                *e.insert(self.groups.len() - 1)
            }
        };

        let state = &mut self.groups[slot];
        for (acc, value) in self.accumulators.iter().zip(state.values.iter_mut()) {
            let incoming = acc.expr.evaluate(doc);
            combine(acc.op, self.mode, value, incoming);
        }
    }

    /// Emit every group and reset
    pub fn finish(&mut self) -> Vec<Document> {
        self.index.clear();
        let accumulators = &self.accumulators;
        self.groups
            .drain(..)
            .map(|state| {
                let mut out = Map::new();
                out.insert("_id".into(), state.id);
                for (acc, value) in accumulators.iter().zip(state.values) {
                    out.insert(acc.name.clone(), finalize(acc.op, value));
                }
                Value::Object(out)
            })
            .collect()
    }
}

/// Collision-free key for a group id
fn group_key(id: &Value) -> String {
    match id {
        // 1 and 1.0 belong to the same group
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => format!("n:{}", f as i64),
            _ => format!("n:{}", n),
        },
        other => other.to_string(),
    }
}

fn combine(op: AccumulatorOp, mode: GroupMode, current: &mut Option<Value>, incoming: Value) {
    match op {
        AccumulatorOp::Sum => {
            if incoming.is_number() {
                let total = match current.take() {
                    Some(existing) => add_numbers(&existing, &incoming),
                    None => incoming,
                };
                *current = Some(total);
            }
        }
        AccumulatorOp::Min | AccumulatorOp::Max => {
            if incoming.is_null() {
                return;
            }
            let replace = match current {
                None => true,
                Some(existing) => {
                    let ord = compare_values(&incoming, existing);
                    if op == AccumulatorOp::Min {
                        ord.is_lt()
                    } else {
                        ord.is_gt()
                    }
                }
            };
            if replace {
                *current = Some(incoming);
            }
        }
        AccumulatorOp::First => {
            if current.is_none() {
                *current = Some(incoming);
            }
        }
        AccumulatorOp::Last => *current = Some(incoming),
        AccumulatorOp::Push => {
            let items = current.get_or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(items) = items {
                match (mode, incoming) {
                    (GroupMode::Merging, Value::Array(partial)) => items.extend(partial),
                    (GroupMode::Merging, Value::Null) => {}
                    (_, value) => items.push(value),
                }
            }
        }
        AccumulatorOp::AddToSet => {
            let items = current.get_or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(items) = items {
                let candidates = match (mode, incoming) {
                    (GroupMode::Merging, Value::Array(partial)) => partial,
                    (GroupMode::Merging, Value::Null) => Vec::new(),
                    (_, value) => vec![value],
                };
                for value in candidates {
                    if !items.iter().any(|existing| values_equal(existing, &value)) {
                        items.push(value);
                    }
                }
            }
        }
    }
}

fn finalize(op: AccumulatorOp, value: Option<Value>) -> Value {
    match (op, value) {
        (_, Some(v)) => v,
        (AccumulatorOp::Sum, None) => Value::from(0),
        (AccumulatorOp::Push | AccumulatorOp::AddToSet, None) => Value::Array(Vec::new()),
        (_, None) => Value::Null,
    }
}

fn add_numbers(a: &Value, b: &Value) -> Value {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = x.checked_add(y) {
            return Value::from(sum);
        }
    }
    let sum = a.as_f64().unwrap_or(0.0) + b.as_f64().unwrap_or(0.0);
    Number::from_f64(sum).map(Value::Number).unwrap_or(Value::Null)
}
