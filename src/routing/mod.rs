//! Partition maps and shard targeting

mod errors;
mod key;
mod partition_map;
mod targeter;

pub use errors::{RoutingError, RoutingErrorKind, RoutingResult};
pub use key::{KeyBound, KeyInterval};
pub use partition_map::{Chunk, ChunkVersion, PartitionMap, ShardId, SnapshotComparison};
pub use targeter::{Targeter, Targeting};
