//! Per-execution context supplied by the host

use std::time::Duration;

use crate::cursor::Deadline;
use crate::pipeline::Namespace;
use crate::view::{ResolvedNamespaces, ResolvedView};

/// Deadline and view knowledge for one union execution
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub deadline: Deadline,
    pub resolved_namespaces: ResolvedNamespaces,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the clock on an end-to-end time limit
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.deadline = Deadline::after(limit);
        self
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    /// Share a resolved-namespace table with other executions
    pub fn with_resolved_namespaces(mut self, table: ResolvedNamespaces) -> Self {
        self.resolved_namespaces = table;
        self
    }

    pub fn with_resolved_namespace(self, namespace: Namespace, view: ResolvedView) -> Self {
        self.resolved_namespaces.insert(namespace, view);
        self
    }
}
