//! ctxfrag - Command-line interface for context fragments.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "ctxfrag")]
#[command(about = "Freeze, snapshot and inspect assistant context fragments", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Freeze files and print their content hashes
    Freeze {
        /// Project root
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Files to freeze (relative to the root, or absolute)
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Commit files as one context and save the session
    Snapshot {
        /// Project root
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Session file to write
        #[arg(short, long)]
        out: PathBuf,
        /// Action recorded for the context
        #[arg(short, long, default_value = "Added files")]
        action: String,
        /// Files to add as editable fragments
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Print the contexts of a saved session
    Inspect {
        /// Session file
        file: PathBuf,
        /// Project root
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Verify a saved session's references and snapshot hashes
    Verify {
        /// Session file
        file: PathBuf,
        /// Project root
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize tracing subscriber
    // Respects RUST_LOG environment variable (e.g., RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Freeze { root, paths } => commands::freeze::run(&root, &paths),
        Commands::Snapshot {
            root,
            out,
            action,
            paths,
        } => commands::snapshot::run(&root, &out, &action, &paths),
        Commands::Inspect { file, root } => commands::inspect::run(&file, &root),
        Commands::Verify { file, root } => commands::verify::run(&file, &root),
    }
}
