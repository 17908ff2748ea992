//! Versioned partition map snapshots
//!
//! A `PartitionMap` is an immutable copy of the metadata service's chunk
//! table for one namespace. Snapshots are compared by `(epoch, version)`:
//! - same epoch, same version: identical routing
//! - same epoch, minor bump: chunks were split (refined)
//! - same epoch, any other change: chunks moved (rebalanced)
//! - different epoch or namespace: the collection identity changed
//!
//! Refreshing never mutates a snapshot; the caller swaps in the new one.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::errors::{RoutingError, RoutingResult};
use super::key::{KeyBound, KeyInterval};
use crate::pipeline::Namespace;

/// Identifier of a shard
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardId(String);

impl ShardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShardId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Placement version within one epoch.
///
/// `major` increases when chunks migrate between shards, `minor` when a
/// chunk is split in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkVersion {
    pub major: u32,
    pub minor: u32,
}

impl ChunkVersion {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for ChunkVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.major, self.minor)
    }
}

/// A contiguous key range `[min, max)` owned by one shard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub min: KeyBound,
    pub max: KeyBound,
    pub shard: ShardId,
}

impl Chunk {
    pub fn new(min: KeyBound, max: KeyBound, shard: impl Into<ShardId>) -> Self {
        Self {
            min,
            max,
            shard: shard.into(),
        }
    }
}

/// Outcome of comparing a snapshot with a newer fetch of the same namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotComparison {
    Same,
    Refined,
    Rebalanced,
    Incompatible,
}

#[derive(Deserialize)]
struct RawPartitionMap {
    namespace: Namespace,
    #[serde(default)]
    shard_key: Option<String>,
    epoch: Uuid,
    version: ChunkVersion,
    chunks: Vec<Chunk>,
}

impl TryFrom<RawPartitionMap> for PartitionMap {
    type Error = RoutingError;

    fn try_from(raw: RawPartitionMap) -> Result<Self, Self::Error> {
        PartitionMap::new(raw.namespace, raw.shard_key, raw.epoch, raw.version, raw.chunks)
    }
}

/// Immutable routing snapshot for one namespace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPartitionMap")]
pub struct PartitionMap {
    namespace: Namespace,
    /// `None` for an unsharded namespace
    shard_key: Option<String>,
    epoch: Uuid,
    version: ChunkVersion,
    chunks: Vec<Chunk>,
}

impl PartitionMap {
    /// Build a snapshot, validating that chunks tile `[MinKey, MaxKey)`
    pub fn new(
        namespace: Namespace,
        shard_key: Option<String>,
        epoch: Uuid,
        version: ChunkVersion,
        chunks: Vec<Chunk>,
    ) -> RoutingResult<Self> {
        let first = chunks
            .first()
            .ok_or_else(|| RoutingError::invalid_chunk_table("chunk table is empty"))?;
        if first.min != KeyBound::MinKey {
            return Err(RoutingError::invalid_chunk_table(
                "first chunk must start at MinKey",
            ));
        }
        for chunk in &chunks {
            if chunk.min >= chunk.max {
                return Err(RoutingError::invalid_chunk_table(format!(
                    "chunk on shard {} has min >= max",
                    chunk.shard
                )));
            }
        }
        for pair in chunks.windows(2) {
            if pair[0].max != pair[1].min {
                return Err(RoutingError::invalid_chunk_table(
                    "chunks must be sorted and contiguous",
                ));
            }
        }
        if chunks.last().map(|c| &c.max) != Some(&KeyBound::MaxKey) {
            return Err(RoutingError::invalid_chunk_table(
                "last chunk must end at MaxKey",
            ));
        }
        if shard_key.is_none() && chunks.len() != 1 {
            return Err(RoutingError::invalid_chunk_table(
                "an unsharded namespace has exactly one chunk",
            ));
        }

        Ok(Self {
            namespace,
            shard_key,
            epoch,
            version,
            chunks,
        })
    }

    /// Snapshot for a namespace that lives entirely on its primary shard
    pub fn unsharded(namespace: Namespace, primary: impl Into<ShardId>, epoch: Uuid) -> Self {
        Self {
            namespace,
            shard_key: None,
            epoch,
            version: ChunkVersion::new(1, 0),
            chunks: vec![Chunk::new(KeyBound::MinKey, KeyBound::MaxKey, primary)],
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn shard_key(&self) -> Option<&str> {
        self.shard_key.as_deref()
    }

    pub fn epoch(&self) -> Uuid {
        self.epoch
    }

    pub fn version(&self) -> ChunkVersion {
        self.version
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn is_sharded(&self) -> bool {
        self.shard_key.is_some()
    }

    /// Every shard owning at least one chunk
    pub fn all_shards(&self) -> BTreeSet<ShardId> {
        self.chunks.iter().map(|c| c.shard.clone()).collect()
    }

    /// Shard owning `key`
    pub fn lookup(&self, key: &Value) -> &ShardId {
        let key = KeyBound::Value(key.clone());
        // chunks tile the key space and start at MinKey, so idx >= 1
        let idx = self.chunks.partition_point(|c| c.min <= key);
        &self.chunks[idx.saturating_sub(1)].shard
    }

    /// Shards owning any chunk that intersects `interval`
    pub fn shards_overlapping(&self, interval: &KeyInterval) -> BTreeSet<ShardId> {
        self.chunks
            .iter()
            .filter(|c| interval.overlaps(&c.min, &c.max))
            .map(|c| c.shard.clone())
            .collect()
    }

    /// Portions of `interval` owned by `shard`, adjacent chunks coalesced.
    ///
    /// Two snapshots give equal results for a shard exactly when that shard
    /// is responsible for the same keys of the query under both.
    pub fn covered_ranges(&self, shard: &ShardId, interval: &KeyInterval) -> Vec<KeyInterval> {
        let mut merged: Vec<(KeyBound, KeyBound)> = Vec::new();
        for chunk in self.chunks.iter().filter(|c| &c.shard == shard) {
            match merged.last_mut() {
                Some((_, max)) if *max == chunk.min => *max = chunk.max.clone(),
                _ => merged.push((chunk.min.clone(), chunk.max.clone())),
            }
        }
        merged
            .iter()
            .filter_map(|(min, max)| interval.clip(min, max))
            .collect()
    }

    /// Classify `newer` relative to this snapshot
    pub fn compare(&self, newer: &PartitionMap) -> SnapshotComparison {
        if self.namespace != newer.namespace || self.epoch != newer.epoch {
            return SnapshotComparison::Incompatible;
        }
        if self.version == newer.version {
            return SnapshotComparison::Same;
        }
        if self.version.major == newer.version.major && newer.version.minor > self.version.minor
        {
            SnapshotComparison::Refined
        } else {
            SnapshotComparison::Rebalanced
        }
    }
}
