//! Embedding providers for the knowledge store.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
