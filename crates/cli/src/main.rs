//! Bruin CLI — the main entry point.
//!
//! Commands:
//! - `run`    — Start the assistant (console chat + alarm scheduler)
//! - `config` — Inspect or initialize the configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "bruin",
    about = "Bruin — an alarm-keeping chat assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the assistant: console chat, alarm scheduler, event processor
    Run {
        /// Path to an alternate config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Inspect or initialize the configuration
    Config {
        #[command(subcommand)]
        action: commands::config_cmd::ConfigAction,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run { config } => commands::run::run(config).await?,
        Commands::Config { action } => commands::config_cmd::run(action).await?,
    }

    Ok(())
}
