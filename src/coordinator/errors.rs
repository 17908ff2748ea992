//! # Union Errors
//!
//! The error surfaced to the host from `next()`. Once an execution aborts,
//! every later pull returns a clone of the same error.

use thiserror::Error;

use crate::pipeline::PipelineError;
use crate::routing::RoutingError;

/// Result type for union execution
pub type UnionResult<T> = Result<T, UnionError>;

/// Union execution errors
#[derive(Debug, Clone, Error)]
pub enum UnionError {
    // ==================
    // Time Errors
    // ==================
    /// The end-to-end deadline elapsed
    #[error("Deadline expired during {0}")]
    DeadlineExpired(String),

    // ==================
    // Routing Errors
    // ==================
    /// The collection was dropped, recreated or resharded mid-query
    #[error("Routing for {namespace} changed incompatibly: {reason}")]
    IncompatibleRouting { namespace: String, reason: String },

    /// Metadata service failure
    #[error(transparent)]
    Routing(#[from] RoutingError),

    // ==================
    // Retry Errors
    // ==================
    /// A retry budget ran out
    #[error("Exhausted {kind} retries after {attempts} attempts")]
    RetriesExhausted { kind: &'static str, attempts: u32 },

    /// A shard reported a view for an already resolved namespace
    #[error("View resolution repeated for {0}")]
    ViewResolutionLoop(String),

    // ==================
    // Shard Errors
    // ==================
    /// An error code the router does not retry
    #[error("Shard {shard} failed with {code}: {message}")]
    Remote {
        shard: String,
        code: String,
        message: String,
    },

    /// Routing or view signal received after results started streaming
    #[error("Shard {shard} reported {signal} after merging began")]
    MidStream { shard: String, signal: &'static str },

    // ==================
    // Input Errors
    // ==================
    /// The sub-pipeline is malformed
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    // ==================
    // Internal Errors
    // ==================
    /// The coordinator attempted a transition its state machine forbids
    #[error("Illegal transition from {from} to {to}")]
    IllegalTransition { from: &'static str, to: &'static str },
}

impl UnionError {
    /// Stable string code
    pub fn code(&self) -> &'static str {
        match self {
            UnionError::DeadlineExpired(_) => "UNION_DEADLINE_EXPIRED",
            UnionError::IncompatibleRouting { .. } => "UNION_INCOMPATIBLE_ROUTING",
            UnionError::Routing(e) => e.kind.code(),
            UnionError::RetriesExhausted { .. } => "UNION_RETRIES_EXHAUSTED",
            UnionError::ViewResolutionLoop(_) => "UNION_VIEW_RESOLUTION_LOOP",
            UnionError::Remote { .. } => "UNION_REMOTE_ERROR",
            UnionError::MidStream { .. } => "UNION_MID_STREAM_ERROR",
            UnionError::Pipeline(e) => e.code().code(),
            UnionError::Config(_) => "UNION_CONFIG_INVALID",
            UnionError::IllegalTransition { .. } => "UNION_ILLEGAL_TRANSITION",
        }
    }

    /// True when reissuing the whole union later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            UnionError::RetriesExhausted { .. }
            | UnionError::IncompatibleRouting { .. }
            | UnionError::MidStream { .. } => true,
            UnionError::Routing(e) => !e.is_not_found(),
            _ => false,
        }
    }

    pub fn deadline(context: impl Into<String>) -> Self {
        UnionError::DeadlineExpired(context.into())
    }
}
