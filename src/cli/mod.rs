// CLI module
// Command-line surface over the audit store, reflection and adaptation

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::{
    format_apply, format_benchmark, format_history, format_merge, format_preview,
    format_reflection, format_verify, parse_reason, run,
};

/// Audit, reflection and adaptive weighting for multi-reviewer prompt critique
#[derive(Debug, Parser)]
#[command(name = "jury")]
#[command(version)]
#[command(about = "Audit, reflection and adaptive weighting for prompt reviewers")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (default: $JURY_HOME/config.toml or ~/.jury/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Merge a JSON array of critiques, record the review, print the plan
    Merge {
        /// File holding the critiques
        critiques: PathBuf,

        #[arg(long, default_value = "default")]
        project: String,

        /// Prompt that was reviewed (hashed into the record)
        #[arg(long, conflicts_with = "prompt_hash", required_unless_present = "prompt_hash")]
        prompt_file: Option<PathBuf>,

        /// Precomputed prompt hash
        #[arg(long)]
        prompt_hash: Option<String>,

        /// Reviewer priority, overriding [merge].priority
        #[arg(long, value_delimiter = ',')]
        priority: Vec<String>,

        /// Cost of the review cycle in USD
        #[arg(long, default_value_t = 0.0)]
        cost: f64,

        #[arg(long, default_value_t = 0)]
        duration_ms: u64,

        /// Merge and print without writing an audit record
        #[arg(long)]
        dry_run: bool,
    },
    /// Report the outcome of a pending review
    Outcome {
        /// approved, edited or rejected
        outcome: crate::audit::Outcome,

        #[arg(long)]
        prompt_hash: String,

        /// Partition date, YYYY-MM-DD (default: today, UTC)
        #[arg(long)]
        date: Option<chrono::NaiveDate>,

        /// Finding ids that were accepted
        #[arg(long, value_delimiter = ',')]
        accepted: Vec<String>,

        /// Finding ids that were rejected
        #[arg(long, value_delimiter = ',')]
        rejected: Vec<String>,

        /// Rejection reason as id=reason (repeatable)
        #[arg(long = "reason", value_parser = parse_reason)]
        reasons: Vec<(String, String)>,
    },
    /// Check integrity of one partition, or of all of them
    Verify {
        /// Partition date, YYYY-MM-DD
        #[arg(long)]
        date: Option<chrono::NaiveDate>,
    },
    /// Per-reviewer precision and outcome correlation over a window
    Reflect {
        /// Window in days (default: [reflection].window_days)
        #[arg(long)]
        days: Option<u32>,
    },
    /// Show the weight changes `apply` would make
    Preview {
        #[arg(long)]
        days: Option<u32>,
    },
    /// Compute and persist new reviewer weights
    Apply {
        #[arg(long)]
        days: Option<u32>,
    },
    /// Show recent weight changes
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Compare current weights against uniform weights
    Benchmark {
        #[arg(long)]
        days: Option<u32>,
    },
}
