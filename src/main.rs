// jury - audit, reflection and adaptive weighting for prompt reviewers
// Main entry point

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use jury::cli::{run, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    run(cli)
}
