//! Sub-pipeline model for the router
//!
//! Stages arrive parsed. The router only needs to:
//! - read the leading filter for targeting
//! - split the pipeline into a shard half and a merging half
//! - evaluate filters, projections and orderings on the merging side

mod compare;
mod errors;
mod filters;
mod namespace;
mod split;
mod stage;
mod sub_pipeline;

pub use compare::{compare_optional, compare_values, values_equal};
pub use errors::{PipelineError, PipelineErrorCode, PipelineResult};
pub use filters::{lookup_path, PredicateFilter};
pub use namespace::Namespace;
pub use split::{MergeStep, SplitPipeline};
pub use stage::{
    Accumulator, AccumulatorOp, FilterOp, GroupSpec, Predicate, SortDirection, SortSpec, Stage,
    ValueExpr,
};
pub use sub_pipeline::SubPipeline;

/// Documents are plain JSON objects
pub type Document = serde_json::Value;
