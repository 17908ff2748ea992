//! Errors returned by shards
//!
//! Shards answer with a numeric code and a message. A view rejection also
//! carries the view definition.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::view::ResolvedView;

/// Shard error codes the router understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemoteErrorCode {
    HostUnreachable,
    HostNotFound,
    NetworkTimeout,
    SocketException,
    ShutdownInProgress,
    PrimarySteppedDown,
    StaleShardVersion,
    StaleEpoch,
    StaleConfig,
    CommandOnShardedViewNotSupportedOnMongod,
    MaxTimeMSExpired,
    /// Any code without special handling
    Other(i32),
}

impl RemoteErrorCode {
    /// Numeric wire code
    pub fn as_i32(&self) -> i32 {
        match self {
            RemoteErrorCode::HostUnreachable => 6,
            RemoteErrorCode::HostNotFound => 7,
            RemoteErrorCode::SocketException => 9001,
            RemoteErrorCode::NetworkTimeout => 89,
            RemoteErrorCode::ShutdownInProgress => 91,
            RemoteErrorCode::PrimarySteppedDown => 189,
            RemoteErrorCode::StaleShardVersion => 63,
            RemoteErrorCode::StaleEpoch => 150,
            RemoteErrorCode::StaleConfig => 13388,
            RemoteErrorCode::CommandOnShardedViewNotSupportedOnMongod => 169,
            RemoteErrorCode::MaxTimeMSExpired => 50,
            RemoteErrorCode::Other(code) => *code,
        }
    }

    pub fn from_i32(code: i32) -> Self {
        match code {
            6 => RemoteErrorCode::HostUnreachable,
            7 => RemoteErrorCode::HostNotFound,
            9001 => RemoteErrorCode::SocketException,
            89 => RemoteErrorCode::NetworkTimeout,
            91 => RemoteErrorCode::ShutdownInProgress,
            189 => RemoteErrorCode::PrimarySteppedDown,
            63 => RemoteErrorCode::StaleShardVersion,
            150 => RemoteErrorCode::StaleEpoch,
            13388 => RemoteErrorCode::StaleConfig,
            169 => RemoteErrorCode::CommandOnShardedViewNotSupportedOnMongod,
            50 => RemoteErrorCode::MaxTimeMSExpired,
            other => RemoteErrorCode::Other(other),
        }
    }

    pub fn name(&self) -> String {
        match self {
            RemoteErrorCode::Other(code) => format!("Error{}", code),
            known => format!("{:?}", known),
        }
    }
}

/// An error response from a shard
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteError {
    pub code: RemoteErrorCode,
    pub message: String,
    /// Present on view rejections
    pub view: Option<ResolvedView>,
}

impl RemoteError {
    pub fn new(code: RemoteErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            view: None,
        }
    }

    pub fn stale_config(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorCode::StaleConfig, message)
    }

    pub fn network_timeout(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorCode::NetworkTimeout, message)
    }

    pub fn view_resolution(view: ResolvedView) -> Self {
        Self {
            code: RemoteErrorCode::CommandOnShardedViewNotSupportedOnMongod,
            message: format!("namespace is a view over {}", view.namespace),
            view: Some(view),
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code.name(), self.code.as_i32(), self.message)
    }
}

impl std::error::Error for RemoteError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Namespace;

    #[test]
    fn test_code_mapping() {
        for code in [
            RemoteErrorCode::NetworkTimeout,
            RemoteErrorCode::StaleConfig,
            RemoteErrorCode::CommandOnShardedViewNotSupportedOnMongod,
        ] {
            assert_eq!(RemoteErrorCode::from_i32(code.as_i32()), code);
        }
        assert_eq!(RemoteErrorCode::from_i32(12345), RemoteErrorCode::Other(12345));
    }

    #[test]
    fn test_view_payload() {
        let err = RemoteError::view_resolution(ResolvedView::identity(Namespace::new("a", "b")));
        assert!(err.view.is_some());
        assert!(err.to_string().contains("a.b"));
    }
}
