//! Stage descriptors for union sub-pipelines
//!
//! Stages arrive already parsed from the host pipeline. Only the subset the
//! router must understand (to target, split and merge) is modelled.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{PipelineError, PipelineResult};
use super::filters::lookup_path;

/// Filter operation types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    /// Equality: field = value
    Eq(Value),
    /// Greater than or equal: field >= value
    Gte(Value),
    /// Greater than: field > value
    Gt(Value),
    /// Less than or equal: field <= value
    Lte(Value),
    /// Less than: field < value
    Lt(Value),
}

impl FilterOp {
    pub fn is_equality(&self) -> bool {
        matches!(self, FilterOp::Eq(_))
    }

    pub fn is_range(&self) -> bool {
        matches!(
            self,
            FilterOp::Gte(_) | FilterOp::Gt(_) | FilterOp::Lte(_) | FilterOp::Lt(_)
        )
    }

    /// The operand the field is compared against
    pub fn operand(&self) -> &Value {
        match self {
            FilterOp::Eq(v)
            | FilterOp::Gte(v)
            | FilterOp::Gt(v)
            | FilterOp::Lte(v)
            | FilterOp::Lt(v) => v,
        }
    }
}

/// A single predicate (field path + operation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub field: String,
    pub op: FilterOp,
}

impl Predicate {
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Eq(value),
        }
    }

    pub fn gte(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Gte(value),
        }
    }

    pub fn gt(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Gt(value),
        }
    }

    pub fn lte(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Lte(value),
        }
    }

    pub fn lt(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Lt(value),
        }
    }
}

/// A value computed from a document: a constant or a field path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueExpr {
    Constant(Value),
    Field(String),
}

impl ValueExpr {
    /// Evaluates against a document; a missing field yields null
    pub fn evaluate(&self, doc: &Value) -> Value {
        match self {
            ValueExpr::Constant(v) => v.clone(),
            ValueExpr::Field(path) => lookup_path(doc, path).cloned().unwrap_or(Value::Null),
        }
    }
}

/// Group accumulator operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccumulatorOp {
    Sum,
    Min,
    Max,
    First,
    Last,
    Push,
    AddToSet,
}

/// One named output field of a group stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accumulator {
    pub name: String,
    pub op: AccumulatorOp,
    pub expr: ValueExpr,
}

impl Accumulator {
    pub fn new(name: impl Into<String>, op: AccumulatorOp, expr: ValueExpr) -> Self {
        Self {
            name: name.into(),
            op,
            expr,
        }
    }
}

/// Grouping stage: one output document per distinct `id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub id: ValueExpr,
    #[serde(default)]
    pub accumulators: Vec<Accumulator>,
}

impl GroupSpec {
    pub fn new(id: ValueExpr) -> Self {
        Self {
            id,
            accumulators: Vec::new(),
        }
    }

    pub fn with_accumulator(mut self, acc: Accumulator) -> Self {
        self.accumulators.push(acc);
        self
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Sort specification (single field)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// A pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Filter; all predicates combined with AND
    Match(Vec<Predicate>),
    Group(GroupSpec),
    Sort(SortSpec),
    Limit(u64),
    Skip(u64),
    /// Keep only the listed fields (plus `_id`)
    Project(Vec<String>),
    /// Forces everything after it onto the merging side
    InhibitOptimization,
}

impl Stage {
    /// Stage name for explain and log output
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Match(_) => "match",
            Stage::Group(_) => "group",
            Stage::Sort(_) => "sort",
            Stage::Limit(_) => "limit",
            Stage::Skip(_) => "skip",
            Stage::Project(_) => "project",
            Stage::InhibitOptimization => "inhibit_optimization",
        }
    }

    /// Rejects stages that cannot be executed
    pub fn validate(&self) -> PipelineResult<()> {
        match self {
            Stage::Limit(0) => Err(PipelineError::invalid("limit must be positive")),
            Stage::Group(spec) => {
                let mut seen = std::collections::HashSet::new();
                for acc in &spec.accumulators {
                    if acc.name == "_id" || acc.name.is_empty() {
                        return Err(PipelineError::invalid(format!(
                            "invalid accumulator name '{}'",
                            acc.name
                        )));
                    }
                    if !seen.insert(acc.name.as_str()) {
                        return Err(PipelineError::invalid(format!(
                            "duplicate accumulator '{}'",
                            acc.name
                        )));
                    }
                }
                Ok(())
            }
            Stage::Sort(spec) if spec.field.is_empty() => {
                Err(PipelineError::invalid("sort field must not be empty"))
            }
            Stage::Match(preds) if preds.iter().any(|p| p.field.is_empty()) => {
                Err(PipelineError::invalid("match field must not be empty"))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_expr_evaluate() {
        let doc = json!({"a": {"b": 3}});
        assert_eq!(ValueExpr::Field("a.b".into()).evaluate(&doc), json!(3));
        assert_eq!(ValueExpr::Field("missing".into()).evaluate(&doc), Value::Null);
        assert_eq!(ValueExpr::Constant(json!(null)).evaluate(&doc), Value::Null);
    }

    #[test]
    fn test_stage_serde_shape() {
        let stage = Stage::Match(vec![Predicate::eq("_id", json!("X"))]);
        let encoded = serde_json::to_value(&stage).unwrap();
        assert_eq!(encoded, json!({"match": [{"field": "_id", "op": {"eq": "X"}}]}));

        let inhibit: Stage = serde_json::from_value(json!("inhibit_optimization")).unwrap();
        assert_eq!(inhibit, Stage::InhibitOptimization);
    }

    #[test]
    fn test_validate_rejects_zero_limit() {
        assert!(Stage::Limit(0).validate().is_err());
        assert!(Stage::Limit(1).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicate_accumulators() {
        let group = GroupSpec::new(ValueExpr::Constant(Value::Null))
            .with_accumulator(Accumulator::new("n", AccumulatorOp::Sum, ValueExpr::Constant(json!(1))))
            .with_accumulator(Accumulator::new("n", AccumulatorOp::Max, ValueExpr::Field("x".into())));
        assert!(Stage::Group(group).validate().is_err());
    }
}
