//! elmod CLI - load, inspect and build element-module documents.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod builder;
mod commands;
mod config;

#[derive(Parser)]
#[command(name = "elmod")]
#[command(about = "Load components defined in HTML element-module documents")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to elmod.toml config file
    #[arg(short, long, default_value = "elmod.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize elmod in the current directory
    Init {
        /// Overwrite existing files
        #[arg(short, long)]
        yes: bool,
    },

    /// Load a document into a fresh registry and print the report
    Load {
        /// Document URL or path
        location: String,

        /// Construct each registered element and print its root
        #[arg(short, long)]
        instantiate: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compile documents into standalone modules
    Build {
        /// Document or directory of documents
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output directory (defaults to config or "dist/elements")
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = config::load_config(&cli.config)?;

    // Execute command
    match cli.command {
        Commands::Init { yes } => {
            commands::init::run(Path::new("."), yes)?;
        }
        Commands::Load {
            location,
            instantiate,
            json,
        } => {
            commands::load::run(&location, instantiate, json, &config).await?;
        }
        Commands::Build { path, output } => {
            commands::build::run(path, output, &config)?;
        }
    }

    Ok(())
}
