//! The knowledge store: idempotent ingestion and similarity search.

use crate::chunker::chunk_text;
use crate::embeddings::{create_provider, EmbeddingProvider};
use crate::fetch::Fetcher;
use crate::jsonl::{append_record, read_records};
use crate::lancedb_index::LanceDbIndex;
use crate::parser::parse_document;
use crate::types::{IngestRecord, IngestStats, KnowledgeChunk, SearchHit};
use crate::vector_index::VectorIndex;
use chrono::Utc;
use crag_core::{AppConfig, AppError, AppResult};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

/// Ledger file kept next to the index.
pub const LEDGER_FILE: &str = "ingested.jsonl";

/// Search capability handed to a knowledge-bound role.
#[async_trait::async_trait]
pub trait KnowledgeBinding: Send + Sync {
    /// Top-`k` chunks for `query`, most similar first.
    async fn search(&self, query: &str, k: usize) -> AppResult<Vec<SearchHit>>;
}

/// Result of adding one source.
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    Ingested(IngestRecord),
    AlreadyLoaded,
}

/// Stable identity of a source.
pub fn source_id(uri: &str) -> String {
    hex::encode(Sha256::digest(uri.as_bytes()))
}

/// Shared knowledge store.
///
/// Ingestion is serialized by an async mutex and is a no-op for a URI that
/// was already ingested, including in earlier processes when a ledger is
/// attached. Searches never take the ingest lock.
pub struct KnowledgeStore {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    fetcher: Fetcher,
    chunk_size: usize,
    chunk_overlap: usize,
    ledger: Option<PathBuf>,
    loaded: Mutex<HashSet<String>>,
}

impl KnowledgeStore {
    /// Store over an index and embedder, without a persistent ledger.
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> AppResult<Self> {
        Ok(Self {
            index,
            embedder,
            fetcher: Fetcher::new()?,
            chunk_size,
            chunk_overlap,
            ledger: None,
            loaded: Mutex::new(HashSet::new()),
        })
    }

    /// Resolve relative source paths against `dir`.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fetcher = self.fetcher.with_base_dir(dir);
        self
    }

    /// Attach an ingest ledger, marking every URI it lists as loaded.
    pub fn with_ledger(mut self, path: PathBuf) -> AppResult<Self> {
        let records: Vec<IngestRecord> = read_records(&path)?;
        let loaded = self.loaded.get_mut();
        for record in records {
            loaded.insert(record.uri);
        }
        tracing::debug!("Ledger {:?} lists {} ingested sources", path, loaded.len());

        self.ledger = Some(path);
        Ok(self)
    }

    /// Open the configured LanceDB table with its ledger.
    pub async fn open(config: &AppConfig, embedding_api_key: Option<&str>) -> AppResult<Self> {
        let embedder = create_provider(&config.embedding, embedding_api_key)?;
        let uri = config.knowledge_uri();

        let index = LanceDbIndex::open(&uri, &config.knowledge.table_name, embedder.dimensions())
            .await?;

        tracing::info!(
            "Knowledge store at {:?} (table '{}', embedder {}/{})",
            uri,
            config.knowledge.table_name,
            embedder.provider_name(),
            embedder.model_name()
        );

        Self::new(
            Arc::new(index),
            embedder,
            config.knowledge.chunk_size,
            config.knowledge.chunk_overlap,
        )?
        .with_base_dir(config.workspace.clone())
        .with_ledger(uri.join(LEDGER_FILE))
    }

    /// Whether a URI has already been ingested.
    pub async fn is_loaded(&self, uri: &str) -> bool {
        self.loaded.lock().await.contains(uri.trim())
    }

    /// Fetch, chunk, embed and index a source. Idempotent by URI.
    pub async fn add_source(&self, uri: &str) -> AppResult<IngestOutcome> {
        let uri = uri.trim();
        let mut loaded = self.loaded.lock().await;

        if loaded.contains(uri) {
            tracing::debug!("Source already loaded: {}", uri);
            return Ok(IngestOutcome::AlreadyLoaded);
        }

        let record = self.ingest(uri).await?;
        if let Some(ledger) = &self.ledger {
            append_record(ledger, &record)?;
        }
        loaded.insert(uri.to_string());

        Ok(IngestOutcome::Ingested(record))
    }

    /// Add every URI not yet loaded.
    ///
    /// A source that fails is logged, counted and left unloaded so the next
    /// call retries it; the remaining sources still load.
    pub async fn load_pending(&self, uris: &[String]) -> AppResult<IngestStats> {
        let start = Instant::now();
        let mut stats = IngestStats::default();

        for uri in uris {
            match self.add_source(uri).await {
                Ok(IngestOutcome::Ingested(record)) => {
                    stats.sources_loaded += 1;
                    stats.chunks_count += record.chunk_count;
                    stats.bytes_processed += record.byte_count;
                }
                Ok(IngestOutcome::AlreadyLoaded) => stats.sources_skipped += 1,
                Err(e) => {
                    tracing::warn!("Failed to load source {}: {}", uri.trim(), e);
                    stats.sources_failed += 1;
                }
            }
        }

        stats.duration_secs = start.elapsed().as_secs_f64();

        if stats.sources_loaded > 0 {
            tracing::info!(
                "Loaded {} sources ({} chunks, {} bytes) in {:.2}s",
                stats.sources_loaded,
                stats.chunks_count,
                stats.bytes_processed,
                stats.duration_secs
            );
        }

        if stats.sources_failed > 0 {
            tracing::warn!("{} sources failed to load", stats.sources_failed);
        }

        Ok(stats)
    }

    /// Number of chunks in the index.
    pub async fn chunk_count(&self) -> AppResult<usize> {
        self.index.count().await
    }

    async fn ingest(&self, uri: &str) -> AppResult<IngestRecord> {
        tracing::info!("Ingesting {}", uri);

        let fetched = self.fetcher.fetch(uri).await?;
        let document = parse_document(&fetched.body, fetched.content_type);
        let source_id = source_id(uri);

        let candidates = chunk_text(&document.text, self.chunk_size, self.chunk_overlap)?;
        if candidates.is_empty() {
            tracing::warn!("No text extracted from {}", uri);
        }

        let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != candidates.len() {
            return Err(AppError::Knowledge(format!(
                "Embedder returned {} vectors for {} chunks",
                embeddings.len(),
                candidates.len()
            )));
        }

        let chunks: Vec<KnowledgeChunk> = candidates
            .into_iter()
            .zip(embeddings)
            .map(|(candidate, embedding)| KnowledgeChunk {
                id: uuid::Uuid::new_v4().to_string(),
                source_id: source_id.clone(),
                uri: uri.to_string(),
                title: document.title.clone(),
                position: candidate.position,
                text: candidate.text,
                embedding: Some(embedding),
            })
            .collect();

        // Rows left by an ingest whose ledger write never landed.
        self.index.delete_source(&source_id).await?;
        self.index.insert_chunks(&chunks).await?;

        tracing::debug!(
            "Indexed {} ({} chunks, {} bytes, content type {})",
            uri,
            chunks.len(),
            document.text.len(),
            fetched.content_type.as_str()
        );

        Ok(IngestRecord {
            source_id,
            uri: uri.to_string(),
            title: document.title,
            chunk_count: chunks.len() as u32,
            byte_count: document.text.len() as u64,
            indexed_at: Utc::now(),
        })
    }
}

#[async_trait::async_trait]
impl KnowledgeBinding for KnowledgeStore {
    async fn search(&self, query: &str, k: usize) -> AppResult<Vec<SearchHit>> {
        let embedding = self.embedder.embed(query).await?;
        let hits = self.index.search(&embedding, k.max(1)).await?;

        tracing::debug!(
            "Search returned {} hits (top score: {:.3})",
            hits.len(),
            hits.first().map(|h| h.score).unwrap_or(0.0)
        );

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::MockProvider;
    use crate::memory_index::MemoryIndex;
    use std::fs;
    use tempfile::TempDir;

    fn store(index: Arc<MemoryIndex>) -> KnowledgeStore {
        KnowledgeStore::new(index, Arc::new(MockProvider::new(128)), 200, 20).unwrap()
    }

    fn write(dir: &TempDir, name: &str, content: &str) -> String {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path.to_string_lossy().to_string()
    }

    #[test]
    fn test_source_id_is_sha256_of_uri() {
        assert_eq!(
            source_id("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_add_source_twice_ingests_once() {
        let temp = TempDir::new().unwrap();
        let uri = write(&temp, "mcp.md", "# MCP\n\nMCP connects models to tools and data.");
        let index = Arc::new(MemoryIndex::new());
        let store = store(index.clone());

        let first = store.add_source(&uri).await.unwrap();
        let IngestOutcome::Ingested(record) = first else {
            panic!("expected ingestion");
        };
        assert_eq!(record.title.as_deref(), Some("MCP"));
        assert_eq!(record.source_id, source_id(&uri));

        let count = index.count().await.unwrap();
        assert!(count > 0);

        assert!(matches!(
            store.add_source(&uri).await.unwrap(),
            IngestOutcome::AlreadyLoaded
        ));
        assert_eq!(index.count().await.unwrap(), count);
    }

    #[tokio::test]
    async fn test_concurrent_adds_ingest_once() {
        let temp = TempDir::new().unwrap();
        let uri = write(&temp, "a2a.txt", "A2A lets agents talk to other agents.");
        let index = Arc::new(MemoryIndex::new());
        let store = Arc::new(store(index.clone()));

        let (a, b) = tokio::join!(store.add_source(&uri), store.add_source(&uri));
        a.unwrap();
        b.unwrap();

        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_ledger_survives_restart() {
        let temp = TempDir::new().unwrap();
        let uri = write(&temp, "doc.txt", "Persisted knowledge.");
        let ledger = temp.path().join("lancedb").join(LEDGER_FILE);

        let first = store(Arc::new(MemoryIndex::new()))
            .with_ledger(ledger.clone())
            .unwrap();
        first.add_source(&uri).await.unwrap();

        let second = store(Arc::new(MemoryIndex::new()))
            .with_ledger(ledger)
            .unwrap();
        assert!(second.is_loaded(&uri).await);
        assert!(matches!(
            second.add_source(&uri).await.unwrap(),
            IngestOutcome::AlreadyLoaded
        ));
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_marked_loaded() {
        let store = store(Arc::new(MemoryIndex::new()));
        assert!(store.add_source("/no/such/file.md").await.is_err());
        assert!(!store.is_loaded("/no/such/file.md").await);
    }

    #[tokio::test]
    async fn test_load_pending_counts() {
        let temp = TempDir::new().unwrap();
        let a = write(&temp, "a.txt", "Alpha document.");
        let b = write(&temp, "b.txt", "Beta document.");
        let store = store(Arc::new(MemoryIndex::new()));

        store.add_source(&a).await.unwrap();
        let stats = store.load_pending(&[a, b]).await.unwrap();

        assert_eq!(stats.sources_loaded, 1);
        assert_eq!(stats.sources_skipped, 1);
        assert_eq!(stats.chunks_count, 1);
    }

    #[tokio::test]
    async fn test_load_pending_continues_past_failed_source() {
        let temp = TempDir::new().unwrap();
        let good = write(&temp, "good.md", "# Good\n\nThis one loads.");
        let bad = "/no/such/typo.md".to_string();
        let store = store(Arc::new(MemoryIndex::new()));

        let stats = store.load_pending(&[bad.clone(), good.clone()]).await.unwrap();
        assert_eq!(stats.sources_failed, 1);
        assert_eq!(stats.sources_loaded, 1);
        assert!(store.is_loaded(&good).await);
        assert!(!store.is_loaded(&bad).await);

        let again = store.load_pending(&[bad, good]).await.unwrap();
        assert_eq!(again.sources_failed, 1);
        assert_eq!(again.sources_skipped, 1);
    }

    #[tokio::test]
    async fn test_relative_source_resolves_against_base_dir() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("notes")).unwrap();
        fs::write(temp.path().join("notes/a2a.md"), "# A2A\n\nAgents talk to agents.").unwrap();
        let index = Arc::new(MemoryIndex::new());
        let store = store(index.clone()).with_base_dir(temp.path());

        let stats = store.load_pending(&["notes/a2a.md".to_string()]).await.unwrap();
        assert_eq!(stats.sources_loaded, 1);
        assert_eq!(stats.sources_failed, 0);

        let hits = store.search("agents", 1).await.unwrap();
        assert_eq!(hits[0].chunk.uri, "notes/a2a.md");
    }

    #[tokio::test]
    async fn test_reingest_replaces_orphaned_chunks() {
        let temp = TempDir::new().unwrap();
        let uri = write(&temp, "doc.txt", "Indexed but never recorded.");
        let index = Arc::new(MemoryIndex::new());

        // A run whose ledger write failed leaves rows behind.
        let stale = KnowledgeChunk {
            id: "stale".to_string(),
            source_id: source_id(&uri),
            uri: uri.clone(),
            title: None,
            position: 0,
            text: "Indexed but never recorded.".to_string(),
            embedding: Some(vec![0.1; 128]),
        };
        index.insert_chunks(&[stale]).await.unwrap();

        let store = store(index.clone());
        store.add_source(&uri).await.unwrap();

        assert_eq!(index.count().await.unwrap(), 1);
        let hits = store.search("recorded", 4).await.unwrap();
        assert!(hits.iter().all(|h| h.chunk.id != "stale"));
    }

    #[tokio::test]
    async fn test_search_prefers_matching_source() {
        let temp = TempDir::new().unwrap();
        let mcp = write(
            &temp,
            "mcp.html",
            "<html><head><title>MCP guide</title></head><body><p>The Model Context Protocol connects models to tools.</p></body></html>",
        );
        let other = write(&temp, "fruit.txt", "Bananas ripen faster in paper bags.");
        let store = store(Arc::new(MemoryIndex::new()));
        store.load_pending(&[other, mcp.clone()]).await.unwrap();

        let hits = store.search("Model Context Protocol tools", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.uri, mcp);
        assert_eq!(hits[0].chunk.title.as_deref(), Some("MCP guide"));
    }

    #[tokio::test]
    async fn test_search_with_zero_k_returns_one() {
        let temp = TempDir::new().unwrap();
        let uri = write(&temp, "doc.txt", "Something to find.");
        let store = store(Arc::new(MemoryIndex::new()));
        store.add_source(&uri).await.unwrap();

        assert_eq!(store.search("find", 0).await.unwrap().len(), 1);
    }
}
