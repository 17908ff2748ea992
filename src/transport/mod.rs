//! Shard transport and metadata service seams
//!
//! The router talks to shards and to the metadata service only through
//! these traits. Implementations own connections, encoding and pooling.
//! Futures are boxed so the traits stay object safe.

mod classify;
mod errors;

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

pub use classify::{classify, ErrorClass};
pub use errors::{RemoteError, RemoteErrorCode};

use crate::pipeline::{Document, Namespace, Stage};
use crate::routing::{ChunkVersion, PartitionMap, RoutingResult, ShardId};

/// Boxed future returned by transport and metadata calls
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Remote cursor identifier; zero means the shard closed the cursor
pub type CursorId = u64;

/// Opens a cursor for the shard half of a sub-pipeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchRequest {
    pub shard: ShardId,
    pub namespace: Namespace,
    pub pipeline: Vec<Stage>,
    /// Remaining end-to-end budget; absent when there is no deadline
    pub max_time_ms: Option<u64>,
    pub batch_size: Option<u32>,
    /// Version of the snapshot the request was targeted with
    pub routing_version: Option<ChunkVersion>,
}

/// Fetches the next batch of an open cursor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GetMoreRequest {
    pub shard: ShardId,
    pub namespace: Namespace,
    pub cursor_id: CursorId,
    pub max_time_ms: Option<u64>,
    pub batch_size: Option<u32>,
}

/// One batch of results
#[derive(Debug, Clone, PartialEq)]
pub struct CursorBatch {
    pub cursor_id: CursorId,
    pub documents: Vec<Document>,
}

impl CursorBatch {
    pub fn new(cursor_id: CursorId, documents: Vec<Document>) -> Self {
        Self {
            cursor_id,
            documents,
        }
    }

    /// A final batch
    pub fn last(documents: Vec<Document>) -> Self {
        Self::new(0, documents)
    }

    /// True when the shard will return nothing more
    pub fn is_exhausted(&self) -> bool {
        self.cursor_id == 0
    }
}

/// Request/response channel to shards
pub trait ShardTransport: Send + Sync {
    fn dispatch(
        &self,
        request: DispatchRequest,
    ) -> TransportFuture<'_, Result<CursorBatch, RemoteError>>;

    fn get_more(
        &self,
        request: GetMoreRequest,
    ) -> TransportFuture<'_, Result<CursorBatch, RemoteError>>;

    /// Best effort; the router does not wait for the outcome
    fn kill_cursor(&self, shard: &ShardId, cursor_id: CursorId);
}

/// Source of partition map snapshots
pub trait MetadataService: Send + Sync {
    fn fetch_routing_info(
        &self,
        namespace: &Namespace,
    ) -> TransportFuture<'_, RoutingResult<PartitionMap>>;
}
