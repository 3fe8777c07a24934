//! Command-line interface for snippet-context
//!
//! Provides `analyze` and `scan` subcommands.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod analyze;
mod scan;
mod utils;

/// Resolve cross-snippet dependencies and synthesize runnable context
#[derive(Parser)]
#[command(name = "snippet-context")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (sets log level to DEBUG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze snippets and emit augmented, validated context
    Analyze(Box<analyze::AnalyzeArgs>),

    /// Show what the static scanner sees in each snippet
    Scan(scan::ScanArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG always applies; --verbose adds DEBUG, otherwise WARN.
    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    match cli.command {
        Commands::Analyze(args) => analyze::run(*args),
        Commands::Scan(args) => scan::run(args),
    }
}
