//! Routing error types
//!
//! - A malformed chunk table is rejected when the snapshot is built
//! - A namespace unknown to the metadata service is reported as `NotFound`

use std::fmt;

/// Routing error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingErrorKind {
    /// Chunks are empty, unsorted, overlapping or leave gaps
    InvalidChunkTable,
    /// The metadata service has no routing information for the namespace
    NamespaceNotFound,
    /// The metadata service could not be reached
    MetadataUnavailable,
}

impl RoutingErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            RoutingErrorKind::InvalidChunkTable => "ROUTER_INVALID_CHUNK_TABLE",
            RoutingErrorKind::NamespaceNotFound => "ROUTER_NAMESPACE_NOT_FOUND",
            RoutingErrorKind::MetadataUnavailable => "ROUTER_METADATA_UNAVAILABLE",
        }
    }
}

/// Routing error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingError {
    pub kind: RoutingErrorKind,
    pub message: String,
}

impl RoutingError {
    pub fn new(kind: RoutingErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_chunk_table(message: impl Into<String>) -> Self {
        Self::new(RoutingErrorKind::InvalidChunkTable, message)
    }

    pub fn namespace_not_found(namespace: impl fmt::Display) -> Self {
        Self::new(
            RoutingErrorKind::NamespaceNotFound,
            format!("no routing information for {}", namespace),
        )
    }

    pub fn metadata_unavailable(message: impl Into<String>) -> Self {
        Self::new(RoutingErrorKind::MetadataUnavailable, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == RoutingErrorKind::NamespaceNotFound
    }
}

impl fmt::Display for RoutingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.code(), self.message)
    }
}

impl std::error::Error for RoutingError {}

/// Result type for routing operations
pub type RoutingResult<T> = Result<T, RoutingError>;
