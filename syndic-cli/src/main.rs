//! Syndic — catalog mirroring CLI.
//!
//! # Usage
//!
//! ```text
//! syndic sync '<json>' [--config <path>]
//! syndic mirror '<json>' [--config <path>]
//! syndic process '<json>' [--config <path>]
//! syndic init '<json>' [--config <path>]
//! ```
//!
//! Every subcommand takes its parameters as one JSON object, so scheduler
//! jobs can pass a single templated argument. Exit status is 0 only when no
//! per-dataset error occurred.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{init::InitArgs, mirror::MirrorArgs, process::ProcessArgs, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "syndic",
    version,
    about = "Mirror datasets between data catalog instances",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Synchronize every eligible dataset from one instance into another.
    Sync(SyncArgs),

    /// Mirror one dataset from a foreign portal by its public URL.
    Mirror(MirrorArgs),

    /// Attach derived artifacts (GeoJSON, XLSX) across an instance.
    Process(ProcessArgs),

    /// Provision a fresh instance with its settings and topic groups.
    Init(InitArgs),
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Sync(args) => args.run(),
        Commands::Mirror(args) => args.run(),
        Commands::Process(args) => args.run(),
        Commands::Init(args) => args.run(),
    }
}
