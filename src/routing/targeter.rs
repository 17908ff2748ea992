//! Shard targeting
//!
//! Targeting is a pure function of a snapshot and a sub-pipeline:
//! - unsharded namespace: its single owning shard
//! - leading filter constraining the shard key: shards whose chunks
//!   intersect the constrained interval (possibly none)
//! - anything else: every shard owning a chunk

use std::collections::BTreeSet;

use serde::Serialize;

use super::key::KeyInterval;
use super::partition_map::{PartitionMap, ShardId};
use crate::pipeline::SubPipeline;

/// The shards to contact and the key interval the query can touch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Targeting {
    pub shards: BTreeSet<ShardId>,
    pub interval: KeyInterval,
}

impl Targeting {
    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }
}

/// Computes the shard set for a sub-pipeline
pub struct Targeter;

impl Targeter {
    pub fn target(map: &PartitionMap, pipeline: &SubPipeline) -> Targeting {
        let interval = Self::query_interval(map, pipeline);
        let shards = if interval.is_constrained() {
            map.shards_overlapping(&interval)
        } else {
            map.all_shards()
        };
        Targeting { shards, interval }
    }

    /// Shard key interval implied by the leading filter
    pub fn query_interval(map: &PartitionMap, pipeline: &SubPipeline) -> KeyInterval {
        match (map.shard_key(), pipeline.leading_filter()) {
            (Some(key), Some(preds)) => KeyInterval::from_predicates(key, preds),
            _ => KeyInterval::full(),
        }
    }
}
