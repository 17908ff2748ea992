//! Coordinator state machine
//!
//! ```text
//! Init -> Targeting -> Dispatching -> AwaitingResponses
//! AwaitingResponses -> Merging | RefreshingMetadata | ResolvingView | Dispatching
//! RefreshingMetadata -> Targeting
//! ResolvingView -> Targeting
//! Merging -> Streaming -> AwaitingResponses | Eof
//! any non-terminal -> Aborting -> Aborted
//! ```
//!
//! `Eof` and `Aborted` are terminal.

use super::errors::{UnionError, UnionResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Init,
    Targeting,
    Dispatching,
    AwaitingResponses,
    RefreshingMetadata,
    ResolvingView,
    Merging,
    Streaming,
    Eof,
    Aborting,
    Aborted,
}

impl CoordinatorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Targeting => "TARGETING",
            Self::Dispatching => "DISPATCHING",
            Self::AwaitingResponses => "AWAITING_RESPONSES",
            Self::RefreshingMetadata => "REFRESHING_METADATA",
            Self::ResolvingView => "RESOLVING_VIEW",
            Self::Merging => "MERGING",
            Self::Streaming => "STREAMING",
            Self::Eof => "EOF",
            Self::Aborting => "ABORTING",
            Self::Aborted => "ABORTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Eof | Self::Aborted)
    }

    pub fn can_transition_to(&self, next: CoordinatorState) -> bool {
        use CoordinatorState::*;

        if next == Aborting {
            return !self.is_terminal() && *self != Aborting;
        }
        matches!(
            (*self, next),
            (Init, Targeting)
                | (Targeting, Dispatching)
                | (Dispatching, AwaitingResponses)
                | (AwaitingResponses, Merging)
                | (AwaitingResponses, RefreshingMetadata)
                | (AwaitingResponses, ResolvingView)
                | (AwaitingResponses, Dispatching)
                | (RefreshingMetadata, Targeting)
                | (ResolvingView, Targeting)
                | (Merging, Streaming)
                | (Streaming, AwaitingResponses)
                | (Streaming, Eof)
                | (Aborting, Aborted)
        )
    }

    pub fn transition(self, next: CoordinatorState) -> UnionResult<Self> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(UnionError::IllegalTransition {
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}
