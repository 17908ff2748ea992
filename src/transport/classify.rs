//! Error classification
//!
//! Every shard error is mapped to exactly one class before the coordinator
//! looks at it. Retry decisions match on the class, never on raw codes.

use super::errors::{RemoteError, RemoteErrorCode};
use crate::coordinator::UnionError;
use crate::routing::ShardId;
use crate::view::ResolvedView;

/// What the coordinator should do about a shard error
#[derive(Debug, Clone)]
pub enum ErrorClass {
    /// The shard's routing version differs from the router's snapshot
    RetryableStale,
    /// The shard could not be reached or timed out
    RetryableNetwork,
    /// The namespace is a view; rewrite and retarget
    ViewResolution(ResolvedView),
    /// Abort the execution
    Fatal(UnionError),
}

impl ErrorClass {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorClass::RetryableStale => "stale",
            ErrorClass::RetryableNetwork => "network",
            ErrorClass::ViewResolution(_) => "view",
            ErrorClass::Fatal(_) => "fatal",
        }
    }
}

/// Classify an error returned by `shard`
pub fn classify(shard: &ShardId, err: RemoteError) -> ErrorClass {
    match err.code {
        RemoteErrorCode::StaleShardVersion
        | RemoteErrorCode::StaleEpoch
        | RemoteErrorCode::StaleConfig => ErrorClass::RetryableStale,
        RemoteErrorCode::HostUnreachable
        | RemoteErrorCode::HostNotFound
        | RemoteErrorCode::NetworkTimeout
        | RemoteErrorCode::SocketException
        | RemoteErrorCode::ShutdownInProgress
        | RemoteErrorCode::PrimarySteppedDown => ErrorClass::RetryableNetwork,
        RemoteErrorCode::CommandOnShardedViewNotSupportedOnMongod => match err.view {
            Some(view) => ErrorClass::ViewResolution(view),
            None => ErrorClass::Fatal(remote_fatal(shard, &err)),
        },
        RemoteErrorCode::MaxTimeMSExpired | RemoteErrorCode::Other(_) => {
            ErrorClass::Fatal(remote_fatal(shard, &err))
        }
    }
}

fn remote_fatal(shard: &ShardId, err: &RemoteError) -> UnionError {
    UnionError::Remote {
        shard: shard.to_string(),
        code: err.code.name(),
        message: err.message.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Namespace;

    fn shard() -> ShardId {
        ShardId::new("0")
    }

    #[test]
    fn test_stale_codes() {
        for code in [
            RemoteErrorCode::StaleShardVersion,
            RemoteErrorCode::StaleEpoch,
            RemoteErrorCode::StaleConfig,
        ] {
            let class = classify(&shard(), RemoteError::new(code, "stale"));
            assert!(matches!(class, ErrorClass::RetryableStale));
        }
    }

    #[test]
    fn test_network_codes() {
        let class = classify(&shard(), RemoteError::network_timeout("timeout"));
        assert!(matches!(class, ErrorClass::RetryableNetwork));
        let class = classify(
            &shard(),
            RemoteError::new(RemoteErrorCode::HostUnreachable, "down"),
        );
        assert!(matches!(class, ErrorClass::RetryableNetwork));
    }

    #[test]
    fn test_view_needs_payload() {
        let view = ResolvedView::identity(Namespace::new("test", "backing"));
        let class = classify(&shard(), RemoteError::view_resolution(view.clone()));
        match class {
            ErrorClass::ViewResolution(v) => assert_eq!(v, view),
            other => panic!("unexpected class {:?}", other),
        }

        let bare = RemoteError::new(
            RemoteErrorCode::CommandOnShardedViewNotSupportedOnMongod,
            "view",
        );
        assert!(matches!(classify(&shard(), bare), ErrorClass::Fatal(_)));
    }

    #[test]
    fn test_unknown_and_time_limit_are_fatal() {
        let class = classify(&shard(), RemoteError::new(RemoteErrorCode::Other(2), "bad value"));
        match class {
            ErrorClass::Fatal(err) => assert!(err.to_string().contains("bad value")),
            other => panic!("unexpected class {:?}", other),
        }
        let class = classify(
            &shard(),
            RemoteError::new(RemoteErrorCode::MaxTimeMSExpired, "expired"),
        );
        assert!(matches!(class, ErrorClass::Fatal(_)));
    }
}
