//! CLI argument definitions using clap
//!
//! Commands:
//! - shardunion plan --routing <path> --pipeline <path>
//! - shardunion check-config --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// shardunion - router-side execution of sharded union sub-pipelines
#[derive(Parser, Debug)]
#[command(name = "shardunion")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the dispatch plan for a sub-pipeline against a routing snapshot
    Plan {
        /// Path to a partition map snapshot (JSON)
        #[arg(long)]
        routing: PathBuf,

        /// Path to a sub-pipeline (JSON)
        #[arg(long)]
        pipeline: PathBuf,

        /// Optional router configuration, for the batch size
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Load and validate a router configuration file
    CheckConfig {
        /// Path to configuration file
        #[arg(long, default_value = "./shardunion.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
