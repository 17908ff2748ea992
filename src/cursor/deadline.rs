//! End-to-end deadline
//!
//! One deadline covers the whole execution. Each outbound request carries
//! the remaining budget in whole milliseconds and is also bounded locally
//! by the same budget. Less than one millisecond left counts as expired.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::coordinator::{UnionError, UnionResult};

/// Absolute expiry instant, or none for an unbounded execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    expires_at: Option<Instant>,
}

impl Deadline {
    pub fn unbounded() -> Self {
        Self { expires_at: None }
    }

    /// Expire `budget` from now. A budget too large to represent as an
    /// instant is unbounded.
    pub fn after(budget: Duration) -> Self {
        Self {
            expires_at: Instant::now().checked_add(budget),
        }
    }

    pub fn from_budget(budget: Option<Duration>) -> Self {
        budget.map_or_else(Self::unbounded, Self::after)
    }

    pub fn is_bounded(&self) -> bool {
        self.expires_at.is_some()
    }

    /// Time left; `None` when unbounded
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        matches!(self.remaining(), Some(left) if left < Duration::from_millis(1))
    }

    /// Budget to forward to a shard, failing when nothing is left
    pub fn max_time_ms(&self, during: &str) -> UnionResult<Option<u64>> {
        match self.remaining() {
            None => Ok(None),
            Some(left) => {
                let ms = u64::try_from(left.as_millis()).unwrap_or(u64::MAX);
                if ms == 0 {
                    Err(UnionError::deadline(during))
                } else {
                    Ok(Some(ms))
                }
            }
        }
    }

    /// Await `fut` for at most the remaining budget
    pub async fn run<F, T>(&self, during: &str, fut: F) -> UnionResult<T>
    where
        F: Future<Output = T>,
    {
        match self.remaining() {
            None => Ok(fut.await),
            Some(left) if left < Duration::from_millis(1) => Err(UnionError::deadline(during)),
            Some(left) => tokio::time::timeout(left, fut)
                .await
                .map_err(|_| UnionError::deadline(during)),
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::unbounded()
    }
}
