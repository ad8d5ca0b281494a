use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use travel_rag::commands::{reset, seed, serve, show_config, show_status};
use travel_rag::config::Config;

#[derive(Parser)]
#[command(name = "travel-rag")]
#[command(about = "Retrieval-augmented travel question answering service")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the knowledge base
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve,
    /// Load the curated dataset into the knowledge base
    Seed {
        /// JSON seed file; defaults to the configured seed file
        file: Option<PathBuf>,
    },
    /// Remove every document from the knowledge base
    Reset,
    /// Show store, embedder and generator status
    Status,
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => Config::config_dir().context("Failed to determine config directory")?,
    };
    let config = Config::load(&config_dir)
        .with_context(|| format!("Failed to load configuration from {}", config_dir.display()))?;

    match cli.command {
        Commands::Serve => serve(&config).await?,
        Commands::Seed { file } => seed(&config, file.as_deref()).await?,
        Commands::Reset => reset(&config).await?,
        Commands::Status => show_status(&config).await?,
        Commands::Config => show_config(&config)?,
    }

    Ok(())
}
