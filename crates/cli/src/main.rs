//! crag CLI
//!
//! Main entry point for the crag command-line tool: corrective,
//! self-reflective question answering over a local knowledge base.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, RolesCommand, SourcesCommand};
use crag_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Instrument;

/// crag - corrective agentic RAG
#[derive(Parser, Debug)]
#[command(name = "crag")]
#[command(about = "Corrective, self-reflective agentic RAG", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "CRAG_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "CRAG_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider (gemini, ollama)
    #[arg(short, long, global = true, env = "CRAG_PROVIDER")]
    provider: Option<String>,

    /// Default model identifier for every role
    #[arg(short, long, global = true, env = "CRAG_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a question; retries until a confident, grounded answer
    Ask(AskCommand),

    /// Knowledge source management
    Sources(SourcesCommand),

    /// Show role configuration
    Roles(RolesCommand),
}

#[tokio::main]
async fn main() -> AppResult<ExitCode> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load configuration; the workspace and config file flags decide which
    // file is merged
    let config = AppConfig::load_from(cli.workspace.clone(), cli.config.clone())?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_json)?;

    tracing::info!("crag starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    config.validate()?;
    config.ensure_crag_dir()?;

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Sources(_) => "sources",
        Commands::Roles(_) => "roles",
    };
    let span = tracing::info_span!("command", name = command_name);

    // Route to command handlers
    async {
        let result = match cli.command {
            Commands::Ask(cmd) => cmd.execute(&config).await,
            Commands::Sources(cmd) => cmd.execute(&config).await.map(|_| ExitCode::SUCCESS),
            Commands::Roles(cmd) => cmd.execute(&config).await.map(|_| ExitCode::SUCCESS),
        };

        match &result {
            Ok(_) => tracing::info!("Command completed"),
            Err(e) => tracing::error!("Command failed: {}", e),
        }

        result
    }
    .instrument(span)
    .await
}
