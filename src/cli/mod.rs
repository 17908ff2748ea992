//! CLI module for shardunion
//!
//! Provides command-line interface for:
//! - plan: offline targeting and split of a sub-pipeline
//! - check-config: configuration validation

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{build_plan, check_config, plan, run, run_command, DispatchPlan};
pub use errors::{CliError, CliErrorCode, CliResult};
