//! TrialScout CLI, the main entry point.
//!
//! Commands:
//! - `serve`   Build the study index and start the HTTP API
//! - `ask`     Ask questions about the indexed studies
//! - `search`  Find registry studies matching a patient description
//! - `index`   Build the study index and print its statistics
//! - `config`  Show the effective configuration

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use trialscout_config::AppConfig;

mod bootstrap;
mod commands;

#[derive(Parser)]
#[command(
    name = "trialscout",
    about = "TrialScout: clinical-trial search and grounded question answering",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.trialscout/config.toml
    #[arg(short, long, global = true, env = "TRIALSCOUT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the study index and start the HTTP API
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask a question about the indexed studies
    Ask {
        /// Ask a single question instead of entering interactive mode
        #[arg(short, long)]
        question: Option<String>,
    },

    /// Find registry studies matching a patient description
    Search {
        /// Free-text patient description
        #[arg(short, long)]
        input: String,

        /// Write the records to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build the study index and print its statistics
    Index,

    /// Show the effective configuration (API key redacted)
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = AppConfig::load_with(cli.config.as_deref()).context("Failed to load config")?;

    match cli.command {
        Commands::Serve { port } => commands::serve::run(config, port).await,
        Commands::Ask { question } => commands::ask::run(config, question).await,
        Commands::Search { input, output } => commands::search::run(config, input, output).await,
        Commands::Index => commands::index::run(config).await,
        Commands::Config => commands::config_cmd::run(&config, cli.config.as_deref()),
    }
}
