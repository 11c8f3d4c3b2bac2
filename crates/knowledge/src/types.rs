//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered knowledge source (one line of `.crag/sources.jsonl`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSource {
    /// Source identity: the URI as registered
    pub uri: String,

    /// When the source was registered
    pub added_at: DateTime<Utc>,
}

impl KnowledgeSource {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            added_at: Utc::now(),
        }
    }
}

/// A source that has been fetched, chunked and indexed (`ingested.jsonl`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRecord {
    /// sha256 of the URI, hex encoded
    pub source_id: String,

    /// Source URI
    pub uri: String,

    /// Document title, when the source declared one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Number of chunks created from this source
    pub chunk_count: u32,

    /// Extracted text size in bytes
    pub byte_count: u64,

    /// When this source was indexed
    pub indexed_at: DateTime<Utc>,
}

/// A text chunk with embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    /// Unique chunk identifier
    pub id: String,

    /// Source document ID
    pub source_id: String,

    /// Source URI, carried on every chunk so hits can be cited
    pub uri: String,

    /// Source title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Position within source
    pub position: u32,

    /// Text content
    pub text: String,

    /// Embedding vector
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// A chunk returned by a similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub chunk: KnowledgeChunk,

    /// Cosine similarity to the query, higher is closer
    pub score: f32,
}

/// A reference to a source that contributed retrieved context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Citation {
    pub fn new(url: impl Into<String>, title: Option<String>) -> Self {
        Self {
            url: url.into(),
            title,
        }
    }

    /// Text shown for the citation: its title, or the URL when untitled.
    pub fn label(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&self.url)
    }
}

/// Citations for the distinct sources of a hit list, in hit order.
pub fn citations_from_hits(hits: &[SearchHit]) -> Vec<Citation> {
    let mut citations: Vec<Citation> = Vec::new();
    for hit in hits {
        if citations.iter().any(|c| c.url == hit.chunk.uri) {
            continue;
        }
        citations.push(Citation::new(hit.chunk.uri.clone(), hit.chunk.title.clone()));
    }
    citations
}

/// Statistics from loading pending sources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    /// Sources fetched and indexed in this run
    pub sources_loaded: u32,

    /// Sources skipped because they were already indexed
    pub sources_skipped: u32,

    /// Sources that could not be fetched or indexed; retried on the next load
    #[serde(default)]
    pub sources_failed: u32,

    /// Number of chunks created
    pub chunks_count: u32,

    /// Total bytes processed
    pub bytes_processed: u64,

    /// Duration in seconds
    pub duration_secs: f64,
}

/// Internal chunk candidate before embedding.
#[derive(Debug, Clone)]
pub struct ChunkCandidate {
    pub position: u32,
    pub text: String,
    /// Byte offset of the chunk in the extracted text
    pub start: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(uri: &str, title: Option<&str>, score: f32) -> SearchHit {
        SearchHit {
            chunk: KnowledgeChunk {
                id: uuid::Uuid::new_v4().to_string(),
                source_id: "src".to_string(),
                uri: uri.to_string(),
                title: title.map(str::to_string),
                position: 0,
                text: "text".to_string(),
                embedding: None,
            },
            score,
        }
    }

    #[test]
    fn test_citations_are_distinct_in_hit_order() {
        let hits = vec![
            hit("https://b.example", Some("B"), 0.9),
            hit("https://a.example", None, 0.8),
            hit("https://b.example", Some("B"), 0.7),
        ];

        let citations = citations_from_hits(&hits);
        assert_eq!(
            citations,
            vec![
                Citation::new("https://b.example", Some("B".to_string())),
                Citation::new("https://a.example", None),
            ]
        );
    }

    #[test]
    fn test_citations_from_no_hits() {
        assert!(citations_from_hits(&[]).is_empty());
    }

    #[test]
    fn test_citation_label_falls_back_to_url() {
        assert_eq!(Citation::new("https://x", None).label(), "https://x");
        assert_eq!(Citation::new("https://x", Some("  ".into())).label(), "https://x");
        assert_eq!(Citation::new("https://x", Some("X".into())).label(), "X");
    }

    #[test]
    fn test_citation_serialization_skips_missing_title() {
        let json = serde_json::to_string(&Citation::new("https://x", None)).unwrap();
        assert_eq!(json, r#"{"url":"https://x"}"#);
    }
}
