//! Union execution: retry coordination over remote cursors
//!
//! The host builds a `RetryCoordinator` per sub-pipeline (or wraps it in a
//! `UnionWith` alongside its local input) and pulls documents with
//! `next().await`.

mod attempt;
mod config;
mod context;
mod errors;
mod retry;
mod state;
mod union_with;

pub use attempt::ExecutionAttempt;
pub use config::RouterConfig;
pub use context::ExecutionContext;
pub use errors::{UnionError, UnionResult};
pub use retry::RetryCoordinator;
pub use state::CoordinatorState;
pub use union_with::UnionWith;
