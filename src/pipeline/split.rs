//! Splitting a sub-pipeline into a shard half and a merging half
//!
//! Stages run on the shards up to the first split point:
//! - `group`: shards produce partial groups, the merger regroups them
//! - `sort`: shards sort, the merger k-way merges by the same key
//!   (a directly following `limit` is also pushed to the shards)
//! - `limit`: applied on both sides
//! - `skip` / `inhibit_optimization`: run on the merger only
//!
//! Everything after the split point runs once on the merger.

use serde::Serialize;

use super::stage::{GroupSpec, SortSpec, Stage};

/// One step of the router-side merge
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStep {
    /// Combine partial groups produced by the shards
    MergeGroup(GroupSpec),
    /// Run a stage over the merged stream
    Apply(Stage),
}

/// Result of splitting a pipeline for distributed execution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitPipeline {
    /// Stages sent to every targeted shard
    pub shard_stages: Vec<Stage>,
    /// Set when every shard stream arrives sorted by this key
    pub merge_sort: Option<SortSpec>,
    /// Stages the router applies to the merged stream
    pub merge_steps: Vec<MergeStep>,
}

impl SplitPipeline {
    /// Split `stages` at the first stage that cannot run per shard
    pub fn split(stages: &[Stage]) -> Self {
        let mut shard_stages = Vec::new();
        let mut merge_sort = None;
        let mut merge_steps = Vec::new();
        let mut rest = stages.len();

        for (i, stage) in stages.iter().enumerate() {
            match stage {
                Stage::Match(_) | Stage::Project(_) => shard_stages.push(stage.clone()),
                Stage::Group(spec) => {
                    shard_stages.push(stage.clone());
                    merge_steps.push(MergeStep::MergeGroup(spec.clone()));
                    rest = i + 1;
                    break;
                }
                Stage::Sort(spec) => {
                    shard_stages.push(stage.clone());
                    if let Some(Stage::Limit(n)) = stages.get(i + 1) {
                        shard_stages.push(Stage::Limit(*n));
                    }
                    merge_sort = Some(spec.clone());
                    rest = i + 1;
                    break;
                }
                Stage::Limit(n) => {
                    shard_stages.push(Stage::Limit(*n));
                    merge_steps.push(MergeStep::Apply(Stage::Limit(*n)));
                    rest = i + 1;
                    break;
                }
                Stage::Skip(_) | Stage::InhibitOptimization => {
                    rest = i;
                    break;
                }
            }
        }

        merge_steps.extend(stages[rest..].iter().cloned().map(MergeStep::Apply));

        Self {
            shard_stages,
            merge_sort,
            merge_steps,
        }
    }

    /// True when the merger passes shard output through untouched
    pub fn is_passthrough(&self) -> bool {
        self.merge_sort.is_none() && self.merge_steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::stage::{Accumulator, AccumulatorOp, Predicate, ValueExpr};
    use serde_json::{json, Value};

    fn count_group() -> GroupSpec {
        GroupSpec::new(ValueExpr::Constant(Value::Null)).with_accumulator(Accumulator::new(
            "count",
            AccumulatorOp::Sum,
            ValueExpr::Constant(json!(1)),
        ))
    }

    #[test]
    fn test_filter_only_is_passthrough() {
        let stages = vec![Stage::Match(vec![Predicate::eq("_id", json!("X"))])];
        let split = SplitPipeline::split(&stages);
        assert_eq!(split.shard_stages, stages);
        assert!(split.is_passthrough());
    }

    #[test]
    fn test_group_splits_into_partial_and_merge() {
        let stages = vec![
            Stage::Match(vec![Predicate::gte("_id", json!(0))]),
            Stage::Group(count_group()),
        ];
        let split = SplitPipeline::split(&stages);
        assert_eq!(split.shard_stages, stages);
        assert_eq!(split.merge_steps, vec![MergeStep::MergeGroup(count_group())]);
    }

    #[test]
    fn test_view_stages_after_group_run_on_merger() {
        let group = GroupSpec::new(ValueExpr::Field("groupKey".into()));
        let trailing = Stage::Match(vec![Predicate::eq("_id", json!("unionResult"))]);
        let stages = vec![
            Stage::Group(group.clone()),
            Stage::InhibitOptimization,
            trailing.clone(),
        ];
        let split = SplitPipeline::split(&stages);
        assert_eq!(split.shard_stages, vec![Stage::Group(group.clone())]);
        assert_eq!(
            split.merge_steps,
            vec![
                MergeStep::MergeGroup(group),
                MergeStep::Apply(Stage::InhibitOptimization),
                MergeStep::Apply(trailing),
            ]
        );
    }

    #[test]
    fn test_sort_limit_pushdown() {
        let stages = vec![Stage::Sort(SortSpec::asc("x")), Stage::Limit(3)];
        let split = SplitPipeline::split(&stages);
        assert_eq!(split.shard_stages, stages);
        assert_eq!(split.merge_sort, Some(SortSpec::asc("x")));
        assert_eq!(split.merge_steps, vec![MergeStep::Apply(Stage::Limit(3))]);
    }

    #[test]
    fn test_skip_stays_on_merger() {
        let stages = vec![Stage::Skip(2), Stage::Match(vec![Predicate::eq("a", json!(1))])];
        let split = SplitPipeline::split(&stages);
        assert!(split.shard_stages.is_empty());
        assert_eq!(split.merge_steps.len(), 2);
    }
}
