//! shardunion - router-side execution of union sub-pipelines over sharded
//! collections
//!
//! - `routing`: partition map snapshots and shard targeting
//! - `cursor`: remote cursors and the end-to-end deadline
//! - `merge`: the router half of a split pipeline
//! - `view`: view resolution and the resolved-namespace table
//! - `coordinator`: the retry state machine driving an execution
//! - `transport`: shard and metadata service seams

pub mod cli;
pub mod coordinator;
pub mod cursor;
pub mod merge;
pub mod observability;
pub mod pipeline;
pub mod routing;
pub mod transport;
pub mod view;

pub use coordinator::{
    ExecutionContext, RetryCoordinator, RouterConfig, UnionError, UnionResult, UnionWith,
};
pub use pipeline::{Document, Namespace, Stage, SubPipeline};
