//! Knowledge store for crag.
//!
//! Sources are fetched (HTTP or local files), reduced to clean text, split
//! into overlapping chunks, embedded and written to a vector index. The
//! retriever role reaches the store only through [`KnowledgeBinding`].

pub mod chunker;
pub mod embeddings;
pub mod fetch;
mod jsonl;
pub mod lancedb_index;
pub mod memory_index;
pub mod parser;
pub mod registry;
pub mod store;
pub mod types;
pub mod vector_index;

// Re-export commonly used types
pub use embeddings::{create_provider, EmbeddingProvider};
pub use lancedb_index::LanceDbIndex;
pub use memory_index::MemoryIndex;
pub use registry::KnowledgeSourceRegistry;
pub use store::{source_id, IngestOutcome, KnowledgeBinding, KnowledgeStore};
pub use types::{
    citations_from_hits, Citation, IngestRecord, IngestStats, KnowledgeChunk, KnowledgeSource,
    SearchHit,
};
pub use vector_index::VectorIndex;
