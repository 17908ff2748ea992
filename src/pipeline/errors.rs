//! Pipeline error types
//!
//! Error codes:
//! - ROUTER_PIPELINE_INVALID (REJECT)
//! - ROUTER_NAMESPACE_INVALID (REJECT)

use std::fmt;

/// Pipeline-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineErrorCode {
    /// Malformed stage or stage sequence
    RouterPipelineInvalid,
    /// Namespace string is not `db.collection`
    RouterNamespaceInvalid,
}

impl PipelineErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            PipelineErrorCode::RouterPipelineInvalid => "ROUTER_PIPELINE_INVALID",
            PipelineErrorCode::RouterNamespaceInvalid => "ROUTER_NAMESPACE_INVALID",
        }
    }
}

impl fmt::Display for PipelineErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Pipeline error with context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineError {
    code: PipelineErrorCode,
    message: String,
}

impl PipelineError {
    /// Create a pipeline invalid error
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            code: PipelineErrorCode::RouterPipelineInvalid,
            message: reason.into(),
        }
    }

    /// Create a namespace invalid error
    pub fn invalid_namespace(ns: impl Into<String>) -> Self {
        Self {
            code: PipelineErrorCode::RouterNamespaceInvalid,
            message: format!("'{}' is not of the form <db>.<collection>", ns.into()),
        }
    }

    /// Returns the error code
    pub fn code(&self) -> PipelineErrorCode {
        self.code
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REJECT] {}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for PipelineError {}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
