//! Mock shards and metadata service
//!
//! Replies are scripted per shard and consumed in order. A dispatch with no
//! scripted reply fails with an unknown error code so an unexpected
//! dispatch surfaces as a test failure; an unscripted getMore returns an
//! empty final batch.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use shardunion::coordinator::{ExecutionContext, RetryCoordinator, RouterConfig, UnionResult};
use shardunion::observability::UnionMetrics;
use shardunion::pipeline::{Document, Namespace, Stage, SubPipeline};
use shardunion::routing::{
    Chunk, ChunkVersion, KeyBound, PartitionMap, RoutingError, RoutingResult, ShardId,
};
use shardunion::transport::{
    CursorBatch, CursorId, DispatchRequest, GetMoreRequest, MetadataService, RemoteError,
    RemoteErrorCode, ShardTransport, TransportFuture,
};

type Reply = Result<CursorBatch, RemoteError>;

/// Scripted shard transport
#[derive(Default)]
pub struct MockTransport {
    dispatch_replies: Mutex<HashMap<ShardId, VecDeque<Reply>>>,
    get_more_replies: Mutex<HashMap<ShardId, VecDeque<Reply>>>,
    delays: Mutex<HashMap<ShardId, Duration>>,
    dispatches: Mutex<Vec<DispatchRequest>>,
    get_mores: Mutex<Vec<GetMoreRequest>>,
    kills: Mutex<Vec<(ShardId, CursorId)>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on_dispatch(&self, shard: &str, reply: Reply) {
        self.dispatch_replies
            .lock()
            .unwrap()
            .entry(ShardId::new(shard))
            .or_default()
            .push_back(reply);
    }

    pub fn on_get_more(&self, shard: &str, reply: Reply) {
        self.get_more_replies
            .lock()
            .unwrap()
            .entry(ShardId::new(shard))
            .or_default()
            .push_back(reply);
    }

    /// Delay every reply from `shard`
    pub fn delay(&self, shard: &str, by: Duration) {
        self.delays.lock().unwrap().insert(ShardId::new(shard), by);
    }

    pub fn dispatches(&self) -> Vec<DispatchRequest> {
        self.dispatches.lock().unwrap().clone()
    }

    pub fn dispatches_to(&self, shard: &str) -> usize {
        self.dispatches
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.shard.as_str() == shard)
            .count()
    }

    pub fn get_mores(&self) -> Vec<GetMoreRequest> {
        self.get_mores.lock().unwrap().clone()
    }

    pub fn kills(&self) -> Vec<(ShardId, CursorId)> {
        self.kills.lock().unwrap().clone()
    }

    fn delay_for(&self, shard: &ShardId) -> Option<Duration> {
        self.delays.lock().unwrap().get(shard).copied()
    }
}

impl ShardTransport for MockTransport {
    fn dispatch(&self, request: DispatchRequest) -> TransportFuture<'_, Reply> {
        let reply = self
            .dispatch_replies
            .lock()
            .unwrap()
            .get_mut(&request.shard)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| {
                Err(RemoteError::new(
                    RemoteErrorCode::Other(8000),
                    format!("unexpected dispatch to shard {}", request.shard),
                ))
            });
        let delay = self.delay_for(&request.shard);
        self.dispatches.lock().unwrap().push(request);
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            reply
        })
    }

    fn get_more(&self, request: GetMoreRequest) -> TransportFuture<'_, Reply> {
        let reply = self
            .get_more_replies
            .lock()
            .unwrap()
            .get_mut(&request.shard)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| Ok(CursorBatch::last(vec![])));
        let delay = self.delay_for(&request.shard);
        self.get_mores.lock().unwrap().push(request);
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            reply
        })
    }

    fn kill_cursor(&self, shard: &ShardId, cursor_id: CursorId) {
        self.kills.lock().unwrap().push((shard.clone(), cursor_id));
    }
}

/// Scripted metadata service. Each namespace serves its snapshots in
/// order; the last one keeps being served.
#[derive(Default)]
pub struct MockMetadata {
    snapshots: Mutex<HashMap<Namespace, VecDeque<PartitionMap>>>,
    fetches: Mutex<Vec<Namespace>>,
}

impl MockMetadata {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, map: PartitionMap) {
        self.snapshots
            .lock()
            .unwrap()
            .entry(map.namespace().clone())
            .or_default()
            .push_back(map);
    }

    pub fn fetches(&self) -> Vec<Namespace> {
        self.fetches.lock().unwrap().clone()
    }

    fn next_snapshot(&self, namespace: &Namespace) -> RoutingResult<PartitionMap> {
        let mut snapshots = self.snapshots.lock().unwrap();
        let queue = snapshots
            .get_mut(namespace)
            .ok_or_else(|| RoutingError::namespace_not_found(namespace))?;
        let map = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        map.ok_or_else(|| RoutingError::namespace_not_found(namespace))
    }
}

impl MetadataService for MockMetadata {
    fn fetch_routing_info(
        &self,
        namespace: &Namespace,
    ) -> TransportFuture<'_, RoutingResult<PartitionMap>> {
        self.fetches.lock().unwrap().push(namespace.clone());
        let reply = self.next_snapshot(namespace);
        Box::pin(async move { reply })
    }
}

// ==================
// Fixtures
// ==================

pub fn ns() -> Namespace {
    Namespace::new("test", "coll")
}

/// `[MinKey, 0) -> 0`, `[0, MaxKey) -> 1`
pub fn two_shard_map(epoch: Uuid, version: ChunkVersion) -> PartitionMap {
    PartitionMap::new(
        ns(),
        Some("_id".into()),
        epoch,
        version,
        vec![
            Chunk::new(KeyBound::MinKey, KeyBound::Value(json!(0)), "0"),
            Chunk::new(KeyBound::Value(json!(0)), KeyBound::MaxKey, "1"),
        ],
    )
    .unwrap()
}

/// `[MinKey, 0) -> 0`, `[0, 10) -> 1`, `[10, MaxKey) -> 0`
pub fn three_chunk_map(epoch: Uuid, version: ChunkVersion) -> PartitionMap {
    PartitionMap::new(
        ns(),
        Some("_id".into()),
        epoch,
        version,
        vec![
            Chunk::new(KeyBound::MinKey, KeyBound::Value(json!(0)), "0"),
            Chunk::new(KeyBound::Value(json!(0)), KeyBound::Value(json!(10)), "1"),
            Chunk::new(KeyBound::Value(json!(10)), KeyBound::MaxKey, "0"),
        ],
    )
    .unwrap()
}

/// Shard 1's chunk split in place: `[0, 10) -> 1`, `[10, MaxKey) -> 1`
pub fn split_in_place_map(epoch: Uuid, version: ChunkVersion) -> PartitionMap {
    PartitionMap::new(
        ns(),
        Some("_id".into()),
        epoch,
        version,
        vec![
            Chunk::new(KeyBound::MinKey, KeyBound::Value(json!(0)), "0"),
            Chunk::new(KeyBound::Value(json!(0)), KeyBound::Value(json!(10)), "1"),
            Chunk::new(KeyBound::Value(json!(10)), KeyBound::MaxKey, "1"),
        ],
    )
    .unwrap()
}

/// Every chunk on one shard
pub fn all_on_map(shard: &str, epoch: Uuid, version: ChunkVersion) -> PartitionMap {
    PartitionMap::new(
        ns(),
        Some("_id".into()),
        epoch,
        version,
        vec![Chunk::new(KeyBound::MinKey, KeyBound::MaxKey, shard)],
    )
    .unwrap()
}

pub fn pipeline(stages: Vec<Stage>) -> SubPipeline {
    SubPipeline::new(ns(), stages)
}

pub struct Setup {
    pub transport: Arc<MockTransport>,
    pub metadata: Arc<MockMetadata>,
    pub metrics: Arc<UnionMetrics>,
}

impl Setup {
    pub fn new() -> Self {
        Self {
            transport: MockTransport::new(),
            metadata: MockMetadata::new(),
            metrics: Arc::new(UnionMetrics::new()),
        }
    }

    pub fn coordinator(&self, pipeline: SubPipeline) -> RetryCoordinator {
        self.coordinator_with(pipeline, ExecutionContext::new(), RouterConfig::default())
    }

    pub fn coordinator_with(
        &self,
        pipeline: SubPipeline,
        context: ExecutionContext,
        config: RouterConfig,
    ) -> RetryCoordinator {
        RetryCoordinator::new(
            pipeline,
            context,
            self.transport.clone(),
            self.metadata.clone(),
        )
        .with_config(config)
        .with_metrics(Arc::clone(&self.metrics))
    }
}

/// Pull until EOF
pub async fn drain(coordinator: &mut RetryCoordinator) -> UnionResult<Vec<Document>> {
    let mut docs = Vec::new();
    while let Some(doc) = coordinator.next().await? {
        docs.push(doc);
    }
    Ok(docs)
}

/// `_id` values sorted for order-insensitive comparison
pub fn sorted_ids(docs: &[Document]) -> Vec<String> {
    let mut ids: Vec<String> = docs.iter().map(|d| d["_id"].to_string()).collect();
    ids.sort();
    ids
}
