//! Text chunking with configurable size and overlap.

use crate::types::ChunkCandidate;
use crag_core::{AppError, AppResult};
use text_splitter::{ChunkConfig, TextSplitter};

/// Split text into overlapping chunks of at most `chunk_size` characters.
///
/// Splits prefer semantic boundaries (paragraphs, sentences, words) over
/// hard character cuts.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> AppResult<Vec<ChunkCandidate>> {
    if text.trim().is_empty() {
        return Ok(vec![]);
    }

    let config = ChunkConfig::new(chunk_size)
        .with_overlap(overlap)
        .map_err(|e| AppError::Knowledge(format!("Invalid chunk configuration: {}", e)))?;
    let splitter = TextSplitter::new(config);

    let chunks: Vec<ChunkCandidate> = splitter
        .chunk_indices(text)
        .filter(|(_, chunk)| !chunk.trim().is_empty())
        .enumerate()
        .map(|(position, (start, chunk))| ChunkCandidate {
            position: position as u32,
            text: chunk.to_string(),
            start,
        })
        .collect();

    tracing::debug!(
        "Chunked {} bytes into {} chunks (size: {}, overlap: {})",
        text.len(),
        chunks.len(),
        chunk_size,
        overlap
    );

    Ok(chunks)
}
