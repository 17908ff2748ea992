//! Remote cursors
//!
//! A `RemoteCursor` is the router's handle on one shard's result stream.
//! Documents are served from the buffered batch; an empty buffer on a live
//! cursor triggers a getMore. Once the shard reports the cursor closed and
//! the buffer drains, the cursor stays at EOF.

use std::collections::VecDeque;

use super::deadline::Deadline;
use crate::pipeline::{Document, Namespace, Stage};
use crate::routing::{ChunkVersion, ShardId};
use crate::transport::{
    classify, CursorBatch, CursorId, DispatchRequest, ErrorClass, GetMoreRequest, ShardTransport,
};

/// Per-request options shared by every cursor of an attempt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorOptions {
    pub batch_size: Option<u32>,
    pub routing_version: Option<ChunkVersion>,
}

#[derive(Debug)]
pub struct RemoteCursor {
    shard: ShardId,
    namespace: Namespace,
    cursor_id: CursorId,
    buffer: VecDeque<Document>,
    exhausted: bool,
    batch_size: Option<u32>,
    /// Documents handed out of the buffer so far
    delivered: u64,
}

impl RemoteCursor {
    /// Send the shard half of a pipeline and wait for the first batch
    pub async fn open_on(
        transport: &dyn ShardTransport,
        shard: &ShardId,
        namespace: &Namespace,
        pipeline: &[Stage],
        options: CursorOptions,
        deadline: &Deadline,
    ) -> Result<Self, ErrorClass> {
        let max_time_ms = deadline.max_time_ms("dispatch").map_err(ErrorClass::Fatal)?;
        let request = DispatchRequest {
            shard: shard.clone(),
            namespace: namespace.clone(),
            pipeline: pipeline.to_vec(),
            max_time_ms,
            batch_size: options.batch_size,
            routing_version: options.routing_version,
        };

        let batch = deadline
            .run("dispatch", transport.dispatch(request))
            .await
            .map_err(ErrorClass::Fatal)?
            .map_err(|e| classify(shard, e))?;

        let mut cursor = Self {
            shard: shard.clone(),
            namespace: namespace.clone(),
            cursor_id: 0,
            buffer: VecDeque::new(),
            exhausted: false,
            batch_size: options.batch_size,
            delivered: 0,
        };
        cursor.absorb(batch);
        Ok(cursor)
    }

    pub fn shard(&self) -> &ShardId {
        &self.shard
    }

    pub fn cursor_id(&self) -> CursorId {
        self.cursor_id
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// True when nothing is buffered and the shard has more
    pub fn needs_fetch(&self) -> bool {
        self.buffer.is_empty() && !self.exhausted
    }

    /// True when the stream is over
    pub fn is_eof(&self) -> bool {
        self.buffer.is_empty() && self.exhausted
    }

    pub fn peek(&self) -> Option<&Document> {
        self.buffer.front()
    }

    pub fn pop_buffered(&mut self) -> Option<Document> {
        let doc = self.buffer.pop_front()?;
        self.delivered += 1;
        Some(doc)
    }

    /// True once any document has left this cursor. Such a cursor can no
    /// longer be replaced by a fresh dispatch without re-delivering.
    pub fn has_delivered(&self) -> bool {
        self.delivered > 0
    }

    /// Next document, fetching from the shard as needed; `None` is EOF
    pub async fn pull_next(
        &mut self,
        transport: &dyn ShardTransport,
        deadline: &Deadline,
    ) -> Result<Option<Document>, ErrorClass> {
        loop {
            if let Some(doc) = self.pop_buffered() {
                return Ok(Some(doc));
            }
            if self.exhausted {
                return Ok(None);
            }
            self.fetch_more(transport, deadline).await?;
        }
    }

    /// Issue one getMore. A failed getMore leaves the cursor unchanged.
    pub async fn fetch_more(
        &mut self,
        transport: &dyn ShardTransport,
        deadline: &Deadline,
    ) -> Result<(), ErrorClass> {
        if self.exhausted {
            return Ok(());
        }
        let max_time_ms = deadline.max_time_ms("getMore").map_err(ErrorClass::Fatal)?;
        let request = GetMoreRequest {
            shard: self.shard.clone(),
            namespace: self.namespace.clone(),
            cursor_id: self.cursor_id,
            max_time_ms,
            batch_size: self.batch_size,
        };

        let batch = deadline
            .run("getMore", transport.get_more(request))
            .await
            .map_err(ErrorClass::Fatal)?
            .map_err(|e| classify(&self.shard, e))?;
        self.absorb(batch);
        Ok(())
    }

    /// Release the shard cursor and drop buffered documents.
    ///
    /// Returns true when a kill was sent.
    pub fn kill(&mut self, transport: &dyn ShardTransport) -> bool {
        self.buffer.clear();
        let live = !self.exhausted && self.cursor_id != 0;
        if live {
            transport.kill_cursor(&self.shard, self.cursor_id);
        }
        self.exhausted = true;
        self.cursor_id = 0;
        live
    }

    fn absorb(&mut self, batch: CursorBatch) {
        self.exhausted = batch.is_exhausted();
        self.cursor_id = batch.cursor_id;
        self.buffer.extend(batch.documents);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{RemoteError, TransportFuture};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedShard {
        replies: Mutex<VecDeque<Result<CursorBatch, RemoteError>>>,
        get_mores: Mutex<Vec<GetMoreRequest>>,
        killed: Mutex<Vec<CursorId>>,
    }

    impl ScriptedShard {
        fn with(replies: Vec<Result<CursorBatch, RemoteError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                ..Default::default()
            }
        }

        fn next_reply(&self) -> Result<CursorBatch, RemoteError> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(CursorBatch::last(vec![])))
        }
    }

    impl ShardTransport for ScriptedShard {
        fn dispatch(
            &self,
            _request: DispatchRequest,
        ) -> TransportFuture<'_, Result<CursorBatch, RemoteError>> {
            let reply = self.next_reply();
            Box::pin(async move { reply })
        }

        fn get_more(
            &self,
            request: GetMoreRequest,
        ) -> TransportFuture<'_, Result<CursorBatch, RemoteError>> {
            self.get_mores.lock().unwrap().push(request);
            let reply = self.next_reply();
            Box::pin(async move { reply })
        }

        fn kill_cursor(&self, _shard: &ShardId, cursor_id: CursorId) {
            self.killed.lock().unwrap().push(cursor_id);
        }
    }

    async fn open(transport: &ScriptedShard) -> Result<RemoteCursor, ErrorClass> {
        RemoteCursor::open_on(
            transport,
            &ShardId::new("0"),
            &Namespace::new("test", "coll"),
            &[],
            CursorOptions::default(),
            &Deadline::unbounded(),
        )
        .await
    }

    #[tokio::test]
    async fn test_pull_across_batches_then_eof() {
        let transport = ScriptedShard::with(vec![
            Ok(CursorBatch::new(42, vec![json!({"_id": 1})])),
            Ok(CursorBatch::new(42, vec![])),
            Ok(CursorBatch::last(vec![json!({"_id": 2})])),
        ]);
        let mut cursor = open(&transport).await.unwrap();
        let deadline = Deadline::unbounded();

        assert_eq!(cursor.pull_next(&transport, &deadline).await.unwrap(), Some(json!({"_id": 1})));
        assert_eq!(cursor.pull_next(&transport, &deadline).await.unwrap(), Some(json!({"_id": 2})));
        assert_eq!(cursor.pull_next(&transport, &deadline).await.unwrap(), None);
        assert_eq!(cursor.pull_next(&transport, &deadline).await.unwrap(), None);

        let get_mores = transport.get_mores.lock().unwrap();
        assert_eq!(get_mores.len(), 2);
        assert!(get_mores.iter().all(|r| r.cursor_id == 42));
    }

    #[tokio::test]
    async fn test_delivery_is_tracked() {
        let transport = ScriptedShard::with(vec![Ok(CursorBatch::new(3, vec![json!({"_id": 1})]))]);
        let mut cursor = open(&transport).await.unwrap();
        assert_eq!(cursor.buffered(), 1);
        assert!(!cursor.has_delivered());

        cursor.pop_buffered();
        assert!(cursor.has_delivered());
    }

    #[tokio::test]
    async fn test_open_classifies_errors() {
        let transport = ScriptedShard::with(vec![Err(RemoteError::stale_config("moved"))]);
        let err = open(&transport).await.unwrap_err();
        assert!(matches!(err, ErrorClass::RetryableStale));
    }

    #[tokio::test]
    async fn test_failed_get_more_keeps_cursor() {
        let transport = ScriptedShard::with(vec![
            Ok(CursorBatch::new(7, vec![])),
            Err(RemoteError::network_timeout("slow")),
            Ok(CursorBatch::last(vec![json!({"_id": "a"})])),
        ]);
        let mut cursor = open(&transport).await.unwrap();
        let deadline = Deadline::unbounded();

        let err = cursor.fetch_more(&transport, &deadline).await.unwrap_err();
        assert!(matches!(err, ErrorClass::RetryableNetwork));
        assert_eq!(cursor.cursor_id(), 7);

        assert_eq!(
            cursor.pull_next(&transport, &deadline).await.unwrap(),
            Some(json!({"_id": "a"}))
        );
    }

    #[tokio::test]
    async fn test_expired_deadline_skips_network() {
        let transport = ScriptedShard::with(vec![Ok(CursorBatch::new(9, vec![]))]);
        let mut cursor = open(&transport).await.unwrap();

        let expired = Deadline::after(std::time::Duration::ZERO);
        let err = cursor.pull_next(&transport, &expired).await.unwrap_err();
        assert!(matches!(err, ErrorClass::Fatal(_)));
        assert!(transport.get_mores.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_kill_only_live_cursors() {
        let transport = ScriptedShard::with(vec![Ok(CursorBatch::new(5, vec![json!(1)]))]);
        let mut cursor = open(&transport).await.unwrap();
        assert!(cursor.kill(&transport));
        assert!(cursor.is_eof());
        assert!(!cursor.kill(&transport));
        assert_eq!(*transport.killed.lock().unwrap(), vec![5]);
    }
}
