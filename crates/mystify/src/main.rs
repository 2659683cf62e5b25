//! Mystify CLI - incremental MyST Markdown builder for Sphinx projects.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

use commands::build::BuildArgs;

#[derive(Parser)]
#[command(name = "mystify")]
#[command(about = "Incremental MyST Markdown builder for Sphinx projects")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to mystify.toml config file
    #[arg(short, long, default_value = "mystify.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write MyST Markdown for out-of-date documents
    Build(BuildArgs),

    /// Rebuild whenever sources or project files change
    Watch {
        /// Output directory (defaults to config or "_build/myst")
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

    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Build(args) => {
            commands::build::run(&cli.config, args).await?;
        }
        Commands::Watch { output } => {
            commands::watch::run(&cli.config, output).await?;
        }
    }

    Ok(())
}
