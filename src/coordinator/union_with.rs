//! Union host stage
//!
//! Yields every document of the local input, then every document of the
//! sharded sub-pipeline, then EOF on every later pull.

use std::collections::VecDeque;

use super::errors::UnionResult;
use super::retry::RetryCoordinator;
use crate::pipeline::Document;

pub struct UnionWith {
    local: VecDeque<Document>,
    sub_pipeline: RetryCoordinator,
}

impl UnionWith {
    pub fn new(local: impl IntoIterator<Item = Document>, sub_pipeline: RetryCoordinator) -> Self {
        Self {
            local: local.into_iter().collect(),
            sub_pipeline,
        }
    }

    pub async fn next(&mut self) -> UnionResult<Option<Document>> {
        if let Some(doc) = self.local.pop_front() {
            return Ok(Some(doc));
        }
        self.sub_pipeline.next().await
    }

    pub fn sub_pipeline(&self) -> &RetryCoordinator {
        &self.sub_pipeline
    }
}
