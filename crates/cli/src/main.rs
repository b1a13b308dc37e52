//! Datalens CLI
//!
//! Main entry point for the datalens command-line tool.
//! Opens the vector store once and hands it to the requested command.

mod commands;

use clap::{Parser, Subcommand};
use commands::{IngestCommand, SearchCommand, StatsCommand};
use datalens_core::{config::AppConfig, logging};
use datalens_store::{create_encoder, VectorStore};
use std::path::PathBuf;

/// Datalens - document ingestion and similarity search over an embedding store
#[derive(Parser, Debug)]
#[command(name = "datalens")]
#[command(about = "Document ingestion and similarity search over a local embedding store", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory holding the vector store snapshot
    #[arg(short, long, global = true, env = "VECTOR_DB_PATH")]
    store_dir: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "DATALENS_CONFIG")]
    config: Option<PathBuf>,

    /// Encoder provider (trigram, ollama)
    #[arg(short, long, global = true, env = "DATALENS_ENCODER")]
    encoder: Option<String>,

    /// Encoder model identifier
    #[arg(short, long, global = true, env = "DATALENS_ENCODER_MODEL")]
    model: Option<String>,

    /// Embedding dimensions produced by the encoder
    #[arg(long, global = true, env = "DATALENS_ENCODER_DIMENSIONS")]
    dimensions: Option<usize>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output (NO_COLOR is read by the config layer)
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Embed pre-chunked texts and add them to the store
    Ingest(IngestCommand),

    /// Rank stored chunks by similarity to a query
    Search(SearchCommand),

    /// Show store statistics
    Stats(StatsCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // clap already falls back to DATALENS_CONFIG for --config
    let config = AppConfig::load_from(cli.config)?.with_overrides(
        cli.store_dir,
        cli.encoder,
        cli.model,
        cli.dimensions,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;
    config.validate()?;

    tracing::info!("Datalens starting");
    tracing::debug!("Store directory: {:?}", config.store_dir);
    tracing::debug!(
        "Encoder: {} / {} ({} dims)",
        config.encoder.provider,
        config.encoder.model,
        config.encoder.dimensions
    );

    let encoder = create_encoder(&config.encoder)?;
    let store = VectorStore::open(&config.store_dir, encoder).await?;

    let command_name = match &cli.command {
        Commands::Ingest(_) => "ingest",
        Commands::Search(_) => "search",
        Commands::Stats(_) => "stats",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ingest(cmd) => cmd.execute(&store).await,
        Commands::Search(cmd) => cmd.execute(&store).await,
        Commands::Stats(cmd) => cmd.execute(&store).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {:#}", e),
    }

    store.close().await?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_color_env_does_not_break_parsing() {
        std::env::set_var("NO_COLOR", "1");
        let cli = Cli::try_parse_from(["datalens", "stats"]).unwrap();
        assert!(!cli.no_color);
        assert!(matches!(cli.command, Commands::Stats(_)));

        let cli = Cli::try_parse_from(["datalens", "--no-color", "stats", "--json"]).unwrap();
        assert!(cli.no_color);
    }
}
