//! Quarry CLI binary.

use clap::Parser;
use quarry::cli::{args::*, commands::*};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let args = QuarryArgs::parse();

    // RUST_LOG wins over the verbosity flags.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    execute_command(args)?;
    Ok(())
}
