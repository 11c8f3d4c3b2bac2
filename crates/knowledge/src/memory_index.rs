//! In-memory vector index with exhaustive cosine search.

use crate::types::{KnowledgeChunk, SearchHit};
use crate::vector_index::{cosine_similarity, rank, VectorIndex};
use crag_core::{AppError, AppResult};
use std::sync::RwLock;

/// Vector index held entirely in memory. Nothing is persisted.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    chunks: RwLock<Vec<KnowledgeChunk>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> AppError {
    AppError::Knowledge("Memory index lock poisoned".to_string())
}

#[async_trait::async_trait]
impl VectorIndex for MemoryIndex {
    async fn insert_chunks(&self, chunks: &[KnowledgeChunk]) -> AppResult<()> {
        if let Some(chunk) = chunks.iter().find(|c| c.embedding.is_none()) {
            return Err(AppError::Knowledge(format!(
                "Chunk {} missing embedding",
                chunk.id
            )));
        }

        self.chunks
            .write()
            .map_err(poisoned)?
            .extend(chunks.iter().cloned());

        tracing::debug!("Inserted {} chunks into memory index", chunks.len());
        Ok(())
    }

    async fn delete_source(&self, source_id: &str) -> AppResult<()> {
        self.chunks
            .write()
            .map_err(poisoned)?
            .retain(|c| c.source_id != source_id);
        Ok(())
    }

    async fn search(&self, query_embedding: &[f32], top_k: usize) -> AppResult<Vec<SearchHit>> {
        let hits: Vec<SearchHit> = self
            .chunks
            .read()
            .map_err(poisoned)?
            .iter()
            .map(|chunk| SearchHit {
                score: chunk
                    .embedding
                    .as_deref()
                    .map(|e| cosine_similarity(query_embedding, e))
                    .unwrap_or(0.0),
                chunk: chunk.clone(),
            })
            .collect();

        Ok(rank(hits, top_k))
    }

    async fn count(&self) -> AppResult<usize> {
        Ok(self.chunks.read().map_err(poisoned)?.len())
    }
}
