//! Scanflow CLI entry point.

use clap::Parser;
use scanflow::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "scanflow=debug" } else { "scanflow=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Scan(cmd) => cmd.run(cli.config).await,
        Commands::Check(cmd) => cmd.run(cli.config).await,
    }
}
