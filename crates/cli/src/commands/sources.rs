//! Sources command handler.
//!
//! Manages the knowledge source registry and ingestion.

use clap::{Args, Subcommand};
use crag_core::{config::AppConfig, AppResult, Credentials};
use crag_knowledge::{KnowledgeSourceRegistry, KnowledgeStore};

/// Knowledge source management
#[derive(Args, Debug)]
pub struct SourcesCommand {
    #[command(subcommand)]
    pub action: SourcesAction,
}

#[derive(Subcommand, Debug)]
pub enum SourcesAction {
    /// List registered sources
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Register a source URL or file path
    Add {
        /// Source URI (http(s)://, file:// or a path relative to the workspace)
        uri: String,
    },

    /// Ingest every registered source not yet loaded
    Load {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

impl SourcesCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            SourcesAction::List { json } => list(config, *json),
            SourcesAction::Add { uri } => add(config, uri),
            SourcesAction::Load { json } => load(config, *json).await,
        }
    }
}

fn list(config: &AppConfig, json: bool) -> AppResult<()> {
    let registry = open_registry(config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(registry.list())?);
        return Ok(());
    }

    if registry.list().is_empty() {
        println!("No sources registered");
        return Ok(());
    }

    for source in registry.list() {
        println!("{}  {}", source.added_at.format("%Y-%m-%d %H:%M"), source.uri);
    }
    Ok(())
}

fn add(config: &AppConfig, uri: &str) -> AppResult<()> {
    let mut registry = open_registry(config)?;

    if registry.add(uri)? {
        println!("Registered {}", uri.trim());
    } else {
        println!("{} is already registered", uri.trim());
    }
    Ok(())
}

async fn load(config: &AppConfig, json: bool) -> AppResult<()> {
    let credentials = Credentials::resolve(config)?;
    let store = open_store(config, &credentials).await?;
    let registry = open_registry(config)?;

    let stats = store.load_pending(&registry.uris()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!(
            "Loaded {} sources ({} chunks, {} bytes), {} already loaded",
            stats.sources_loaded, stats.chunks_count, stats.bytes_processed, stats.sources_skipped
        );
        if stats.sources_failed > 0 {
            println!("{} sources failed to load and will be retried", stats.sources_failed);
        }
        println!("Index holds {} chunks", store.chunk_count().await?);
    }
    Ok(())
}

/// Open the workspace source registry, seeded with the configured defaults.
pub fn open_registry(config: &AppConfig) -> AppResult<KnowledgeSourceRegistry> {
    config.ensure_crag_dir()?;
    KnowledgeSourceRegistry::open(&config.sources_path(), &config.knowledge.default_sources)
}

/// Open the configured knowledge store.
pub async fn open_store(config: &AppConfig, credentials: &Credentials) -> AppResult<KnowledgeStore> {
    KnowledgeStore::open(config, credentials.embedding_api_key.as_deref()).await
}
