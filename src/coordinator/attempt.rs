//! Execution attempts
//!
//! An attempt pairs one routing snapshot with the cursors opened under it.
//! A stale-routing retry builds the next attempt from the previous one:
//! cursors survive only on shards whose share of the query is unchanged.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::cursor::{CursorOptions, RemoteCursor};
use crate::pipeline::{Namespace, SplitPipeline, SubPipeline};
use crate::routing::{PartitionMap, ShardId, Targeter, Targeting};
use crate::transport::ShardTransport;

#[derive(Debug)]
pub struct ExecutionAttempt {
    number: u32,
    namespace: Namespace,
    snapshot: Arc<PartitionMap>,
    split: SplitPipeline,
    targeting: Targeting,
    cursors: BTreeMap<ShardId, RemoteCursor>,
    errors: Vec<(ShardId, &'static str)>,
}

impl ExecutionAttempt {
    pub fn new(number: u32, snapshot: Arc<PartitionMap>, pipeline: &SubPipeline) -> Self {
        let targeting = Targeter::target(&snapshot, pipeline);
        Self {
            number,
            namespace: pipeline.namespace().clone(),
            snapshot,
            split: SplitPipeline::split(pipeline.stages()),
            targeting,
            cursors: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    /// Move to the next attempt under a refreshed snapshot.
    ///
    /// Returns the cursors that could not be carried over; the caller kills
    /// them. Errors recorded so far are kept.
    pub fn retarget(
        &mut self,
        snapshot: Arc<PartitionMap>,
        pipeline: &SubPipeline,
    ) -> Vec<RemoteCursor> {
        let targeting = Targeter::target(&snapshot, pipeline);
        let mut dropped = Vec::new();

        for (shard, cursor) in std::mem::take(&mut self.cursors) {
            let unchanged = targeting.shards.contains(&shard)
                && self.snapshot.covered_ranges(&shard, &self.targeting.interval)
                    == snapshot.covered_ranges(&shard, &targeting.interval);
            if unchanged {
                self.cursors.insert(shard, cursor);
            } else {
                dropped.push(cursor);
            }
        }

        self.number += 1;
        self.namespace = pipeline.namespace().clone();
        self.snapshot = snapshot;
        self.split = SplitPipeline::split(pipeline.stages());
        self.targeting = targeting;
        dropped
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn snapshot(&self) -> &Arc<PartitionMap> {
        &self.snapshot
    }

    pub fn split(&self) -> &SplitPipeline {
        &self.split
    }

    pub fn targeted(&self) -> &BTreeSet<ShardId> {
        &self.targeting.shards
    }

    pub fn cursor_options(&self, batch_size: Option<u32>) -> CursorOptions {
        CursorOptions {
            batch_size,
            routing_version: self
                .snapshot
                .is_sharded()
                .then(|| self.snapshot.version()),
        }
    }

    /// Targeted shards without an open cursor
    pub fn pending_shards(&self) -> Vec<ShardId> {
        self.targeting
            .shards
            .iter()
            .filter(|s| !self.cursors.contains_key(*s))
            .cloned()
            .collect()
    }

    pub fn insert_cursor(&mut self, cursor: RemoteCursor) {
        self.cursors.insert(cursor.shard().clone(), cursor);
    }

    pub fn cursor(&self, shard: &ShardId) -> Option<&RemoteCursor> {
        self.cursors.get(shard)
    }

    /// Detach a cursor; the caller kills it
    pub fn remove_cursor(&mut self, shard: &ShardId) -> Option<RemoteCursor> {
        self.cursors.remove(shard)
    }

    pub fn record_error(&mut self, shard: ShardId, class: &'static str) {
        self.errors.push((shard, class));
    }

    pub fn errors(&self) -> &[(ShardId, &'static str)] {
        &self.errors
    }

    /// Cursors in shard order
    pub fn cursors(&self) -> impl Iterator<Item = &RemoteCursor> {
        self.cursors.values()
    }

    pub fn cursors_mut(&mut self) -> impl Iterator<Item = &mut RemoteCursor> {
        self.cursors.values_mut()
    }

    /// Kill every cursor; returns how many kills were sent
    pub fn kill_all(&mut self, transport: &dyn ShardTransport) -> usize {
        let killed = self
            .cursors
            .values_mut()
            .map(|cursor| cursor.kill(transport))
            .filter(|sent| *sent)
            .count();
        self.cursors.clear();
        killed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{Chunk, ChunkVersion, KeyBound};
    use serde_json::json;
    use uuid::Uuid;

    fn map(epoch: Uuid, minor: u32) -> Arc<PartitionMap> {
        Arc::new(
            PartitionMap::new(
                Namespace::new("test", "coll"),
                Some("_id".into()),
                epoch,
                ChunkVersion::new(1, minor),
                vec![
                    Chunk::new(KeyBound::MinKey, KeyBound::Value(json!(0)), "0"),
                    Chunk::new(KeyBound::Value(json!(0)), KeyBound::MaxKey, "1"),
                ],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_errors_survive_retarget() {
        let pipeline = SubPipeline::new(Namespace::new("test", "coll"), vec![]);
        let epoch = Uuid::new_v4();
        let mut attempt = ExecutionAttempt::new(1, map(epoch, 0), &pipeline);
        assert_eq!(
            attempt.pending_shards(),
            vec![ShardId::new("0"), ShardId::new("1")]
        );

        attempt.record_error(ShardId::new("1"), "stale");
        let dropped = attempt.retarget(map(epoch, 1), &pipeline);

        assert!(dropped.is_empty());
        assert_eq!(attempt.number(), 2);
        assert_eq!(attempt.errors(), &[(ShardId::new("1"), "stale")]);
        assert!(attempt.cursor(&ShardId::new("0")).is_none());
    }
}
