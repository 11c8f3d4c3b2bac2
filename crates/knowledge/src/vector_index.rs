//! Vector index abstraction for knowledge chunks.
//!
//! Defines a trait for provider-agnostic vector storage and retrieval.

use crate::types::{KnowledgeChunk, SearchHit};
use crag_core::AppResult;

/// Trait for vector index backends.
///
/// Methods take `&self` so searches can run while another task ingests.
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Append chunks with their embeddings to the index.
    async fn insert_chunks(&self, chunks: &[KnowledgeChunk]) -> AppResult<()>;

    /// Remove every chunk of a source.
    async fn delete_source(&self, source_id: &str) -> AppResult<()>;

    /// Search for the top-k most similar chunks to the query embedding.
    ///
    /// Returns hits ordered by descending cosine similarity.
    async fn search(&self, query_embedding: &[f32], top_k: usize) -> AppResult<Vec<SearchHit>>;

    /// Number of chunks stored.
    async fn count(&self) -> AppResult<usize>;
}

/// Calculate cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Sort hits by descending score and keep the best `top_k`.
pub(crate) fn rank(mut hits: Vec<SearchHit>, top_k: usize) -> Vec<SearchHit> {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(top_k);
    hits
}
