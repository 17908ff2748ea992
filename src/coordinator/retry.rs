//! Retry coordinator
//!
//! Drives one union sub-pipeline from targeting to EOF, one document per
//! `next()`. Before the first document is handed out it loops through
//! rounds of dispatch until every targeted shard holds a cursor:
//! - fatal errors abort the execution
//! - a view signal rewrites the pipeline and starts over
//! - stale routing triggers one metadata refresh per round and retargets
//! - network errors redispatch the same shard within its retry budget
//!
//! Only then does the merge stage see any document. Once streaming, a
//! getMore failure is handled the same way as long as no document already
//! merged could be delivered twice:
//! - network errors retry the getMore on the same cursor
//! - stale routing on a shard that has delivered nothing discards that
//!   cursor, refreshes once and redispatches; the refresh is fatal only if
//!   it takes away keys from a shard that has already delivered
//! - a view signal restarts the execution if no shard has delivered yet

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use futures_util::stream::{FuturesUnordered, StreamExt};

use super::attempt::ExecutionAttempt;
use super::config::RouterConfig;
use super::context::ExecutionContext;
use super::errors::{UnionError, UnionResult};
use super::state::CoordinatorState;
use crate::cursor::{CursorOptions, Deadline, RemoteCursor};
use crate::merge::{DocumentSorter, MergeStage};
use crate::observability::{log_event_with_fields, Event, UnionMetrics};
use crate::pipeline::{Document, Namespace, SortSpec, Stage, SubPipeline};
use crate::routing::{PartitionMap, ShardId, SnapshotComparison};
use crate::transport::{ErrorClass, MetadataService, ShardTransport};
use crate::view::{ResolvedView, ViewRewriter};

/// What one dispatch round asks the coordinator to do next
#[derive(Default)]
struct RoundOutcome {
    stale: Vec<ShardId>,
    network: Vec<ShardId>,
    view: Option<ResolvedView>,
}

/// Cursors and merge state once the attempt is established
struct ActiveStream {
    attempt: ExecutionAttempt,
    merge: MergeStage,
    merge_sort: Option<SortSpec>,
}

impl ActiveStream {
    fn new(attempt: ExecutionAttempt) -> Self {
        let split = attempt.split().clone();
        Self {
            merge: MergeStage::new(&split),
            merge_sort: split.merge_sort,
            attempt,
        }
    }

    /// Rebuild the merge half after the pipeline changed. Only valid while
    /// nothing has been merged.
    fn reset_merge(&mut self) {
        let split = self.attempt.split();
        self.merge = MergeStage::new(split);
        self.merge_sort = split.merge_sort.clone();
    }

    /// Move one buffered document into the merge stage.
    ///
    /// With a sort key every live cursor must have a buffered head so the
    /// smallest can be chosen; returns false when a getMore is needed first.
    fn feed_one(&mut self) -> bool {
        match &self.merge_sort {
            Some(spec) => {
                if self.attempt.cursors().any(|c| c.needs_fetch()) {
                    return false;
                }
                let heads: Vec<Option<&Document>> =
                    self.attempt.cursors().map(|c| c.peek()).collect();
                let Some(index) = DocumentSorter::pick_next(&heads, spec) else {
                    return false;
                };
                let doc = self
                    .attempt
                    .cursors_mut()
                    .nth(index)
                    .and_then(|c| c.pop_buffered());
                match doc {
                    Some(doc) => {
                        self.merge.push(doc);
                        true
                    }
                    None => false,
                }
            }
            None => {
                let doc = self
                    .attempt
                    .cursors_mut()
                    .find(|c| c.buffered() > 0)
                    .and_then(|c| c.pop_buffered());
                match doc {
                    Some(doc) => {
                        self.merge.push(doc);
                        true
                    }
                    None => false,
                }
            }
        }
    }

    fn all_eof(&self) -> bool {
        self.attempt.cursors().all(|c| c.is_eof())
    }
}

/// Executes a union sub-pipeline against a sharded namespace
pub struct RetryCoordinator {
    pipeline: SubPipeline,
    context: ExecutionContext,
    transport: Arc<dyn ShardTransport>,
    metadata: Arc<dyn MetadataService>,
    config: RouterConfig,
    metrics: Arc<UnionMetrics>,
    state: CoordinatorState,
    snapshot: Option<Arc<PartitionMap>>,
    active: Option<ActiveStream>,
    attempts: u32,
    stale_refreshes: u32,
    view_resolutions: u32,
    network_retries: HashMap<ShardId, u32>,
    failure: Option<UnionError>,
    /// Shard errors of the attempt that failed, for the abort log
    shard_errors: String,
    returned: u64,
}

impl RetryCoordinator {
    /// Create a coordinator. A view definition already present in the
    /// context's resolved-namespace table is applied immediately.
    pub fn new(
        pipeline: SubPipeline,
        context: ExecutionContext,
        transport: Arc<dyn ShardTransport>,
        metadata: Arc<dyn MetadataService>,
    ) -> Self {
        let pipeline = ViewRewriter::apply_known(pipeline, &context.resolved_namespaces);
        Self {
            pipeline,
            context,
            transport,
            metadata,
            config: RouterConfig::default(),
            metrics: Arc::new(UnionMetrics::new()),
            state: CoordinatorState::Init,
            snapshot: None,
            active: None,
            attempts: 0,
            stale_refreshes: 0,
            view_resolutions: 0,
            network_retries: HashMap::new(),
            failure: None,
            shard_errors: String::new(),
            returned: 0,
        }
    }

    pub fn with_config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<UnionMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Start from the router's cached snapshot instead of fetching one
    pub fn with_snapshot(mut self, snapshot: Arc<PartitionMap>) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    /// The pipeline as currently rewritten
    pub fn pipeline(&self) -> &SubPipeline {
        &self.pipeline
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn metrics(&self) -> &Arc<UnionMetrics> {
        &self.metrics
    }

    /// Next document; `Ok(None)` is EOF and repeats forever. After an
    /// error every call returns the same error.
    pub async fn next(&mut self) -> UnionResult<Option<Document>> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        if self.state == CoordinatorState::Eof {
            return Ok(None);
        }

        match self.advance().await {
            Ok(Some(doc)) => {
                self.returned += 1;
                self.metrics.increment_documents_returned();
                Ok(Some(doc))
            }
            Ok(None) => {
                self.finish()?;
                Ok(None)
            }
            Err(err) => {
                self.abort(&err);
                Err(err)
            }
        }
    }

    async fn advance(&mut self) -> UnionResult<Option<Document>> {
        if self.state == CoordinatorState::Init {
            self.pipeline.validate()?;
            self.metrics.increment_executions();
            self.log(Event::UnionStart, &[]);
            self.establish().await?;
            self.transition(CoordinatorState::Streaming)?;
        }
        self.stream_next().await
    }

    // ==================
    // Establishing
    // ==================

    async fn establish(&mut self) -> UnionResult<()> {
        let snapshot = self.initial_snapshot().await?;
        self.transition(CoordinatorState::Targeting)?;
        let mut attempt = self.begin_attempt(snapshot);

        match self.establish_rounds(&mut attempt).await {
            Ok(()) => {
                self.transition(CoordinatorState::Merging)?;
                let split = attempt.split();
                self.log(
                    Event::UnionMerging,
                    &[
                        ("attempt", &attempt.number().to_string()),
                        ("merge_steps", &split.merge_steps.len().to_string()),
                        ("sorted", &split.merge_sort.is_some().to_string()),
                    ],
                );
                self.active = Some(ActiveStream::new(attempt));
                Ok(())
            }
            Err(err) => {
                self.shard_errors = describe_errors(attempt.errors());
                let killed = attempt.kill_all(self.transport.as_ref());
                self.note_killed(killed);
                Err(err)
            }
        }
    }

    async fn establish_rounds(&mut self, attempt: &mut ExecutionAttempt) -> UnionResult<()> {
        loop {
            self.transition(CoordinatorState::Dispatching)?;
            let pending = attempt.pending_shards();
            for shard in &pending {
                self.metrics.increment_dispatches();
                self.log(
                    Event::UnionDispatch,
                    &[
                        ("shard", shard.as_str()),
                        ("attempt", &attempt.number().to_string()),
                    ],
                );
            }

            self.transition(CoordinatorState::AwaitingResponses)?;
            let options = attempt.cursor_options(self.config.batch_size);
            let responses = dispatch_round(
                self.transport.as_ref(),
                pending,
                attempt.namespace(),
                &attempt.split().shard_stages,
                options,
                &self.context.deadline,
            )
            .await;

            let round = absorb_round(attempt, responses)?;

            if let Some(view) = round.view {
                self.resolve_view(attempt, view).await?;
            } else if !round.stale.is_empty() {
                self.refresh_routing(attempt, &round.stale).await?;
            } else if !round.network.is_empty() {
                self.note_network_errors(&round.network)?;
            } else {
                return Ok(());
            }
        }
    }

    async fn initial_snapshot(&mut self) -> UnionResult<Arc<PartitionMap>> {
        if let Some(snapshot) = &self.snapshot {
            if snapshot.namespace() == self.pipeline.namespace() {
                return Ok(Arc::clone(snapshot));
            }
        }
        let namespace = self.pipeline.namespace().clone();
        let fresh = self.fetch_snapshot(&namespace).await?;
        self.snapshot = Some(Arc::clone(&fresh));
        Ok(fresh)
    }

    fn begin_attempt(&mut self, snapshot: Arc<PartitionMap>) -> ExecutionAttempt {
        self.attempts += 1;
        let attempt = ExecutionAttempt::new(self.attempts, snapshot, &self.pipeline);
        self.log_targeted(&attempt);
        attempt
    }

    async fn fetch_snapshot(&self, namespace: &Namespace) -> UnionResult<Arc<PartitionMap>> {
        let deadline = &self.context.deadline;
        deadline.max_time_ms("metadata refresh")?;
        self.metrics.increment_metadata_refreshes();
        let map = deadline
            .run("metadata refresh", self.metadata.fetch_routing_info(namespace))
            .await??;
        Ok(Arc::new(map))
    }

    async fn refresh_routing(
        &mut self,
        attempt: &mut ExecutionAttempt,
        stale: &[ShardId],
    ) -> UnionResult<()> {
        self.transition(CoordinatorState::RefreshingMetadata)?;
        self.stale_refreshes += 1;
        self.metrics.increment_stale_retries();
        self.log(
            Event::UnionStaleRouting,
            &[
                ("shards", &join_shards(stale.iter())),
                ("version", &attempt.snapshot().version().to_string()),
                ("refresh", &self.stale_refreshes.to_string()),
            ],
        );
        if self.stale_refreshes > self.config.max_stale_retries {
            return Err(UnionError::RetriesExhausted {
                kind: "stale routing",
                attempts: self.stale_refreshes,
            });
        }

        let fresh = self.fetch_snapshot(attempt.namespace()).await?;
        let comparison = attempt.snapshot().compare(&fresh);
        if comparison == SnapshotComparison::Incompatible {
            return Err(UnionError::IncompatibleRouting {
                namespace: attempt.namespace().to_string(),
                reason: format!(
                    "epoch {} replaced by {}",
                    attempt.snapshot().epoch(),
                    fresh.epoch()
                ),
            });
        }
        self.log(
            Event::UnionRoutingRefreshed,
            &[
                ("comparison", comparison_name(comparison)),
                ("version", &fresh.version().to_string()),
            ],
        );
        self.snapshot = Some(Arc::clone(&fresh));

        self.transition(CoordinatorState::Targeting)?;
        let dropped = attempt.retarget(fresh, &self.pipeline);
        let delivered = dropped
            .iter()
            .find(|cursor| cursor.has_delivered())
            .map(|cursor| cursor.shard().to_string());
        let killed = dropped
            .into_iter()
            .map(|mut cursor| cursor.kill(self.transport.as_ref()))
            .filter(|sent| *sent)
            .count();
        self.note_killed(killed);
        if let Some(shard) = delivered {
            return Err(UnionError::MidStream {
                shard,
                signal: "stale routing",
            });
        }
        self.attempts += 1;
        self.log_targeted(attempt);
        Ok(())
    }

    async fn resolve_view(
        &mut self,
        attempt: &mut ExecutionAttempt,
        view: ResolvedView,
    ) -> UnionResult<()> {
        self.transition(CoordinatorState::ResolvingView)?;
        self.view_resolutions += 1;
        self.metrics.increment_view_resolutions();
        if self.view_resolutions > self.config.max_view_resolutions {
            return Err(UnionError::RetriesExhausted {
                kind: "view resolution",
                attempts: self.view_resolutions,
            });
        }

        let killed = attempt.kill_all(self.transport.as_ref());
        self.note_killed(killed);

        let original = self.pipeline.namespace().to_string();
        self.pipeline = ViewRewriter::rewrite_and_record(
            &self.pipeline,
            &view,
            &self.context.resolved_namespaces,
        )?;
        self.log(
            Event::UnionViewResolved,
            &[
                ("view", &original),
                ("namespace", &view.namespace.to_string()),
                ("view_stages", &view.stages.len().to_string()),
            ],
        );

        let snapshot = self.fetch_snapshot(&view.namespace).await?;
        self.snapshot = Some(Arc::clone(&snapshot));
        self.transition(CoordinatorState::Targeting)?;
        *attempt = self.begin_attempt(snapshot);
        Ok(())
    }

    fn note_network_errors(&mut self, shards: &[ShardId]) -> UnionResult<()> {
        for shard in shards {
            let count = self.network_retries.entry(shard.clone()).or_insert(0);
            *count += 1;
            let count = *count;
            if count > self.config.max_network_retries {
                return Err(UnionError::RetriesExhausted {
                    kind: "network",
                    attempts: count,
                });
            }
            self.metrics.increment_network_retries();
            self.log(
                Event::UnionNetworkRetry,
                &[("shard", shard.as_str()), ("retry", &count.to_string())],
            );
        }
        Ok(())
    }

    // ==================
    // Streaming
    // ==================

    async fn stream_next(&mut self) -> UnionResult<Option<Document>> {
        loop {
            let Some(active) = self.active.as_mut() else {
                return Ok(None);
            };
            if let Some(doc) = active.merge.pop_ready() {
                return Ok(Some(doc));
            }
            if active.merge.is_finished() {
                return Ok(None);
            }
            if !active.merge.wants_input() {
                let killed = active.attempt.kill_all(self.transport.as_ref());
                active.merge.flush();
                self.note_killed(killed);
                continue;
            }
            if active.feed_one() {
                continue;
            }
            if active.all_eof() {
                active.merge.flush();
                continue;
            }
            self.fetch_round().await?;
        }
    }

    /// getMore on every cursor that has run dry
    async fn fetch_round(&mut self) -> UnionResult<()> {
        self.transition(CoordinatorState::AwaitingResponses)?;

        let results = {
            let Some(active) = self.active.as_mut() else {
                return Ok(());
            };
            let transport = self.transport.as_ref();
            let deadline = &self.context.deadline;
            let metrics = &self.metrics;
            let fetches = active
                .attempt
                .cursors_mut()
                .filter(|cursor| cursor.needs_fetch())
                .map(|cursor| {
                    metrics.increment_get_mores();
                    async move {
                        let result = cursor.fetch_more(transport, deadline).await;
                        (cursor.shard().clone(), result)
                    }
                });
            join_all(fetches).await
        };

        let mut outcome = RoundOutcome::default();
        let mut fatal = None;
        for (shard, result) in results {
            let class = match result {
                Ok(()) => {
                    self.log(Event::UnionGetMore, &[("shard", shard.as_str())]);
                    continue;
                }
                Err(class) => class,
            };
            if let Some(active) = self.active.as_mut() {
                active.attempt.record_error(shard.clone(), class.name());
            }
            match class {
                ErrorClass::RetryableNetwork => outcome.network.push(shard),
                ErrorClass::RetryableStale => outcome.stale.push(shard),
                ErrorClass::ViewResolution(view) => {
                    if outcome.view.is_none() {
                        outcome.view = Some(view);
                    }
                }
                ErrorClass::Fatal(err) => {
                    if fatal.is_none() {
                        fatal = Some(err);
                    }
                }
            }
        }
        if let Some(err) = fatal {
            return Err(err);
        }
        self.note_network_errors(&outcome.network)?;
        if outcome.view.is_some() || !outcome.stale.is_empty() {
            self.reroute(outcome).await?;
        }

        self.transition(CoordinatorState::Merging)?;
        self.transition(CoordinatorState::Streaming)
    }

    /// Re-establish after a stale or view signal on getMore.
    ///
    /// The stream is taken out for the duration and always put back, so an
    /// abort still releases its cursors.
    async fn reroute(&mut self, outcome: RoundOutcome) -> UnionResult<()> {
        let Some(mut active) = self.active.take() else {
            return Ok(());
        };
        let result = self.reroute_stream(&mut active, outcome).await;
        if result.is_err() {
            self.shard_errors = describe_errors(active.attempt.errors());
        }
        self.active = Some(active);
        result
    }

    async fn reroute_stream(
        &mut self,
        active: &mut ActiveStream,
        outcome: RoundOutcome,
    ) -> UnionResult<()> {
        match outcome.view {
            Some(view) => {
                if let Some(cursor) = active.attempt.cursors().find(|c| c.has_delivered()) {
                    return Err(UnionError::MidStream {
                        shard: cursor.shard().to_string(),
                        signal: "view resolution",
                    });
                }
                self.resolve_view(&mut active.attempt, view).await?;
                self.establish_rounds(&mut active.attempt).await?;
                active.reset_merge();
            }
            None => {
                let stale = outcome.stale;
                if let Some(shard) = stale.iter().find(|shard| {
                    active
                        .attempt
                        .cursor(shard)
                        .is_some_and(|cursor| cursor.has_delivered())
                }) {
                    return Err(UnionError::MidStream {
                        shard: shard.to_string(),
                        signal: "stale routing",
                    });
                }
                let mut killed = 0;
                for shard in &stale {
                    if let Some(mut cursor) = active.attempt.remove_cursor(shard) {
                        if cursor.kill(self.transport.as_ref()) {
                            killed += 1;
                        }
                    }
                }
                self.note_killed(killed);
                self.refresh_routing(&mut active.attempt, &stale).await?;
                self.establish_rounds(&mut active.attempt).await?;
            }
        }
        Ok(())
    }

    // ==================
    // Termination
    // ==================

    fn finish(&mut self) -> UnionResult<()> {
        self.transition(CoordinatorState::Eof)?;
        self.release_cursors();
        self.log(Event::UnionEof, &[("documents", &self.returned.to_string())]);
        Ok(())
    }

    fn abort(&mut self, err: &UnionError) {
        self.state = CoordinatorState::Aborting;
        self.release_cursors();
        self.metrics.increment_aborts();
        self.log(
            Event::UnionAborted,
            &[
                ("code", err.code()),
                ("error", &err.to_string()),
                ("shard_errors", &self.shard_errors),
            ],
        );
        self.failure = Some(err.clone());
        self.state = CoordinatorState::Aborted;
    }

    fn release_cursors(&mut self) {
        if let Some(active) = self.active.as_mut() {
            let killed = active.attempt.kill_all(self.transport.as_ref());
            self.note_killed(killed);
        }
    }

    fn note_killed(&self, killed: usize) {
        for _ in 0..killed {
            self.metrics.increment_cursors_killed();
        }
        if killed > 0 {
            self.log(Event::CursorKilled, &[("count", &killed.to_string())]);
        }
    }

    fn transition(&mut self, next: CoordinatorState) -> UnionResult<()> {
        self.state = self.state.transition(next)?;
        Ok(())
    }

    fn log_targeted(&self, attempt: &ExecutionAttempt) {
        self.log(
            Event::UnionTargeted,
            &[
                ("attempt", &attempt.number().to_string()),
                ("shards", &join_shards(attempt.targeted().iter())),
                ("version", &attempt.snapshot().version().to_string()),
            ],
        );
    }

    fn log(&self, event: Event, fields: &[(&str, &str)]) {
        let namespace = self.pipeline.namespace().to_string();
        let mut all = Vec::with_capacity(fields.len() + 1);
        all.push(("namespace", namespace.as_str()));
        all.extend_from_slice(fields);
        log_event_with_fields(event, &all);
    }
}

impl Drop for RetryCoordinator {
    fn drop(&mut self) {
        if !self.state.is_terminal() {
            self.release_cursors();
        }
    }
}

/// Open cursors on `shards` concurrently; responses in arrival order
async fn dispatch_round(
    transport: &dyn ShardTransport,
    shards: Vec<ShardId>,
    namespace: &Namespace,
    stages: &[Stage],
    options: CursorOptions,
    deadline: &Deadline,
) -> Vec<(ShardId, Result<RemoteCursor, ErrorClass>)> {
    let mut in_flight: FuturesUnordered<_> = shards
        .into_iter()
        .map(|shard| async move {
            let result =
                RemoteCursor::open_on(transport, &shard, namespace, stages, options, deadline)
                    .await;
            (shard, result)
        })
        .collect();

    let mut responses = Vec::new();
    while let Some(response) = in_flight.next().await {
        responses.push(response);
    }
    responses
}

/// Keep successful cursors and sort errors by class. A fatal error wins;
/// among views the first to arrive is used.
fn absorb_round(
    attempt: &mut ExecutionAttempt,
    responses: Vec<(ShardId, Result<RemoteCursor, ErrorClass>)>,
) -> UnionResult<RoundOutcome> {
    let mut outcome = RoundOutcome::default();
    let mut fatal = None;

    for (shard, response) in responses {
        let class = match response {
            Ok(cursor) => {
                attempt.insert_cursor(cursor);
                continue;
            }
            Err(class) => class,
        };
        attempt.record_error(shard.clone(), class.name());
        match class {
            ErrorClass::RetryableStale => outcome.stale.push(shard),
            ErrorClass::RetryableNetwork => outcome.network.push(shard),
            ErrorClass::ViewResolution(view) => {
                if outcome.view.is_none() {
                    outcome.view = Some(view);
                }
            }
            ErrorClass::Fatal(err) => {
                if fatal.is_none() {
                    fatal = Some(err);
                }
            }
        }
    }

    match fatal {
        Some(err) => Err(err),
        None => Ok(outcome),
    }
}

fn describe_errors(errors: &[(ShardId, &'static str)]) -> String {
    errors
        .iter()
        .map(|(shard, class)| format!("{}:{}", shard, class))
        .collect::<Vec<_>>()
        .join(",")
}

fn join_shards<'a>(shards: impl Iterator<Item = &'a ShardId>) -> String {
    shards.map(ShardId::as_str).collect::<Vec<_>>().join(",")
}

fn comparison_name(comparison: SnapshotComparison) -> &'static str {
    match comparison {
        SnapshotComparison::Same => "same",
        SnapshotComparison::Refined => "refined",
        SnapshotComparison::Rebalanced => "rebalanced",
        SnapshotComparison::Incompatible => "incompatible",
    }
}
