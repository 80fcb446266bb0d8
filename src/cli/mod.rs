//! CLI command definitions and handlers.
//!
//! - `scanflow scan <target>` - Run a progressive scan and stream events
//! - `scanflow check` - Probe remote scanning service availability

mod scan;

pub use scan::{CheckCommand, ScanCommand};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Scanflow - progressive network scan orchestrator.
///
/// Runs liveness check and fast port enumeration up front, hands the
/// deep scan to a background worker, and streams progress events for the
/// whole session to the terminal.
#[derive(Parser, Debug)]
#[command(name = "scanflow")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Progressive network scan orchestrator", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to custom settings file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a progressive scan against a target
    #[command(alias = "s")]
    Scan(ScanCommand),

    /// Probe the remote scanning service
    #[command(alias = "c")]
    Check(CheckCommand),
}
