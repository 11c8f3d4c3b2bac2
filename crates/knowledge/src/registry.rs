//! Registry of knowledge sources (`.crag/sources.jsonl`).

use crate::jsonl::{append_record, read_records};
use crate::types::KnowledgeSource;
use crag_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

/// The list of source URIs the knowledge store should contain.
///
/// Registration is idempotent by URI. A registry with no file yet is seeded
/// with the configured default sources.
#[derive(Debug)]
pub struct KnowledgeSourceRegistry {
    path: PathBuf,
    sources: Vec<KnowledgeSource>,
}

impl KnowledgeSourceRegistry {
    /// Open the registry at `path`, seeding it with `defaults` when empty.
    pub fn open(path: &Path, defaults: &[String]) -> AppResult<Self> {
        let sources: Vec<KnowledgeSource> = read_records(path)?;

        let mut registry = Self {
            path: path.to_path_buf(),
            sources: Vec::new(),
        };

        // Earlier duplicates win; later ones are ignored.
        for source in sources {
            if !registry.contains(&source.uri) {
                registry.sources.push(source);
            }
        }

        if registry.sources.is_empty() {
            for uri in defaults {
                registry.add(uri)?;
            }
            tracing::debug!("Seeded source registry with {} defaults", defaults.len());
        }

        Ok(registry)
    }

    /// All registered sources, in registration order.
    pub fn list(&self) -> &[KnowledgeSource] {
        &self.sources
    }

    /// Registered URIs, in registration order.
    pub fn uris(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.uri.clone()).collect()
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.sources.iter().any(|s| s.uri == uri)
    }

    /// Register a source. Returns `false` when it was already registered.
    pub fn add(&mut self, uri: &str) -> AppResult<bool> {
        let uri = uri.trim();
        if uri.is_empty() {
            return Err(AppError::Knowledge("Source URI cannot be empty".to_string()));
        }

        if self.contains(uri) {
            tracing::debug!("Source already registered: {}", uri);
            return Ok(false);
        }

        let source = KnowledgeSource::new(uri);
        append_record(&self.path, &source)?;
        self.sources.push(source);

        tracing::info!("Registered source: {}", uri);
        Ok(true)
    }
}
