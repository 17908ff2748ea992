//! Counters for sharded union execution
//!
//! - Counters only, monotonic
//! - Relaxed atomics; shared between executions through `Arc`

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Registry of router counters
#[derive(Debug, Default)]
pub struct UnionMetrics {
    executions: AtomicU64,
    dispatches: AtomicU64,
    get_mores: AtomicU64,
    metadata_refreshes: AtomicU64,
    stale_retries: AtomicU64,
    network_retries: AtomicU64,
    view_resolutions: AtomicU64,
    cursors_killed: AtomicU64,
    documents_returned: AtomicU64,
    aborts: AtomicU64,
}

/// Point-in-time copy of every counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub executions: u64,
    pub dispatches: u64,
    pub get_mores: u64,
    pub metadata_refreshes: u64,
    pub stale_retries: u64,
    pub network_retries: u64,
    pub view_resolutions: u64,
    pub cursors_killed: u64,
    pub documents_returned: u64,
    pub aborts: u64,
}

impl UnionMetrics {
    /// Create a registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_executions(&self) {
        self.executions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_dispatches(&self) {
        self.dispatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_get_mores(&self) {
        self.get_mores.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_metadata_refreshes(&self) {
        self.metadata_refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_stale_retries(&self) {
        self.stale_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_network_retries(&self) {
        self.network_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_view_resolutions(&self) {
        self.view_resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cursors_killed(&self) {
        self.cursors_killed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_documents_returned(&self) {
        self.documents_returned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_aborts(&self) {
        self.aborts.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            executions: self.executions.load(Ordering::Relaxed),
            dispatches: self.dispatches.load(Ordering::Relaxed),
            get_mores: self.get_mores.load(Ordering::Relaxed),
            metadata_refreshes: self.metadata_refreshes.load(Ordering::Relaxed),
            stale_retries: self.stale_retries.load(Ordering::Relaxed),
            network_retries: self.network_retries.load(Ordering::Relaxed),
            view_resolutions: self.view_resolutions.load(Ordering::Relaxed),
            cursors_killed: self.cursors_killed.load(Ordering::Relaxed),
            documents_returned: self.documents_returned.load(Ordering::Relaxed),
            aborts: self.aborts.load(Ordering::Relaxed),
        }
    }

    /// Current counters as a JSON object string
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}
