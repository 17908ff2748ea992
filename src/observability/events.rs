//! Observable events emitted while executing a sharded union
//!
//! Events are explicit and typed; the string form is the `event` key of
//! the log line.

use std::fmt;

use super::logger::Severity;

/// Observable router events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Sub-pipeline execution started
    UnionStart,
    /// Shard set computed for an attempt
    UnionTargeted,
    /// Initial request sent to a shard
    UnionDispatch,
    /// getMore sent to a shard
    UnionGetMore,
    /// Every targeted shard answered, merging begins
    UnionMerging,
    /// Final EOF reached
    UnionEof,

    // Retry paths
    /// A shard reported a stale routing version
    UnionStaleRouting,
    /// A fresh partition map snapshot was installed
    UnionRoutingRefreshed,
    /// A shard revealed that the namespace is a view
    UnionViewResolved,
    /// A shard request is retried after a network failure
    UnionNetworkRetry,

    // Failure / cleanup
    /// Execution aborted with a fatal error
    UnionAborted,
    /// Kill notification sent for a server-side cursor
    CursorKilled,

    // Configuration
    /// Router configuration loaded
    ConfigLoaded,
}

impl Event {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::UnionStart => "UNION_START",
            Event::UnionTargeted => "UNION_TARGETED",
            Event::UnionDispatch => "UNION_DISPATCH",
            Event::UnionGetMore => "UNION_GET_MORE",
            Event::UnionMerging => "UNION_MERGING",
            Event::UnionEof => "UNION_EOF",
            Event::UnionStaleRouting => "UNION_STALE_ROUTING",
            Event::UnionRoutingRefreshed => "UNION_ROUTING_REFRESHED",
            Event::UnionViewResolved => "UNION_VIEW_RESOLVED",
            Event::UnionNetworkRetry => "UNION_NETWORK_RETRY",
            Event::UnionAborted => "UNION_ABORTED",
            Event::CursorKilled => "CURSOR_KILLED",
            Event::ConfigLoaded => "CONFIG_LOADED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::UnionDispatch | Event::UnionGetMore | Event::CursorKilled => Severity::Trace,
            Event::UnionStaleRouting | Event::UnionNetworkRetry => Severity::Warn,
            Event::UnionAborted => Severity::Error,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
