//! Router-side merging of shard result streams

mod group;
mod sort;
mod stage;

pub use group::{GroupMode, GroupProcessor};
pub use sort::DocumentSorter;
pub use stage::MergeStage;
