//! Remote cursors and the execution deadline

mod deadline;
mod remote;

pub use deadline::Deadline;
pub use remote::{CursorOptions, RemoteCursor};
