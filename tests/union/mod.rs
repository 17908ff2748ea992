//! Test support for sharded union execution
//!
//! - Scripted shard transport recording every request
//! - Scripted metadata service
//! - Partition map fixtures

pub mod harness;

pub use harness::*;
