//! LanceDB-backed vector index implementation.

use crate::types::{KnowledgeChunk, SearchHit};
use crate::vector_index::{cosine_similarity, rank, VectorIndex};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
    UInt32Array,
};
use arrow_schema::{DataType, Field, Schema};
use crag_core::{AppError, AppResult};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};
use std::path::Path;
use std::sync::Arc;

/// LanceDB-backed vector index for knowledge chunks.
pub struct LanceDbIndex {
    table: Table,
    embedding_dim: usize,
}

impl LanceDbIndex {
    /// Create or open a LanceDB table.
    ///
    /// # Arguments
    /// * `db_path` - Directory of the LanceDB database (e.g. `tmp/lancedb`)
    /// * `table_name` - Name of the table (e.g. `elite_rag_docs`)
    /// * `embedding_dim` - Dimension of embedding vectors
    pub async fn open(db_path: &Path, table_name: &str, embedding_dim: usize) -> AppResult<Self> {
        std::fs::create_dir_all(db_path).map_err(|e| {
            AppError::Knowledge(format!("Failed to create index directory: {}", e))
        })?;

        let uri = db_path.to_string_lossy().to_string();
        let conn = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to connect to LanceDB: {}", e)))?;

        let table_names = conn
            .table_names()
            .execute()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to list tables: {}", e)))?;

        let table = if table_names.iter().any(|name| name == table_name) {
            conn.open_table(table_name)
                .execute()
                .await
                .map_err(|e| AppError::Knowledge(format!("Failed to open table: {}", e)))?
        } else {
            let schema = Self::create_schema(embedding_dim);
            let empty_batch = RecordBatch::new_empty(schema.clone());

            conn.create_table(
                table_name,
                RecordBatchIterator::new(vec![Ok(empty_batch)], schema),
            )
            .execute()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to create table: {}", e)))?
        };

        tracing::debug!("Opened LanceDB table '{}' at {:?}", table_name, db_path);

        Ok(Self {
            table,
            embedding_dim,
        })
    }

    fn create_schema(embedding_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("source_id", DataType::Utf8, false),
            Field::new("uri", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, true),
            Field::new("position", DataType::UInt32, false),
            Field::new("text", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    embedding_dim as i32,
                ),
                false,
            ),
        ]))
    }

    /// Convert chunks to a single Arrow RecordBatch.
    fn chunks_to_batch(&self, chunks: &[KnowledgeChunk]) -> AppResult<RecordBatch> {
        let mut values = Vec::with_capacity(chunks.len() * self.embedding_dim);
        for chunk in chunks {
            let embedding = chunk.embedding.as_ref().ok_or_else(|| {
                AppError::Knowledge(format!("Chunk {} missing embedding", chunk.id))
            })?;

            if embedding.len() != self.embedding_dim {
                return Err(AppError::Knowledge(format!(
                    "Embedding dimension mismatch: expected {}, got {}",
                    self.embedding_dim,
                    embedding.len()
                )));
            }
            values.extend_from_slice(embedding);
        }

        let vectors = FixedSizeListArray::try_new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            self.embedding_dim as i32,
            Arc::new(Float32Array::from(values)),
            None,
        )
        .map_err(|e| AppError::Knowledge(format!("Failed to build vector column: {}", e)))?;

        RecordBatch::try_new(
            Self::create_schema(self.embedding_dim),
            vec![
                Arc::new(StringArray::from_iter_values(
                    chunks.iter().map(|c| c.id.as_str()),
                )),
                Arc::new(StringArray::from_iter_values(
                    chunks.iter().map(|c| c.source_id.as_str()),
                )),
                Arc::new(StringArray::from_iter_values(
                    chunks.iter().map(|c| c.uri.as_str()),
                )),
                Arc::new(StringArray::from(
                    chunks.iter().map(|c| c.title.as_deref()).collect::<Vec<_>>(),
                )),
                Arc::new(UInt32Array::from_iter_values(
                    chunks.iter().map(|c| c.position),
                )),
                Arc::new(StringArray::from_iter_values(
                    chunks.iter().map(|c| c.text.as_str()),
                )),
                Arc::new(vectors),
            ],
        )
        .map_err(|e| AppError::Knowledge(format!("Failed to create RecordBatch: {}", e)))
    }

    /// Convert every row of a result batch back into chunks.
    fn batch_to_chunks(batch: &RecordBatch) -> AppResult<Vec<KnowledgeChunk>> {
        let id = string_column(batch, "id")?;
        let source_id = string_column(batch, "source_id")?;
        let uri = string_column(batch, "uri")?;
        let title = string_column(batch, "title")?;
        let text = string_column(batch, "text")?;
        let position = batch
            .column_by_name("position")
            .and_then(|c| c.as_any().downcast_ref::<UInt32Array>())
            .ok_or_else(|| AppError::Knowledge("Invalid position column".to_string()))?;
        let vectors = batch
            .column_by_name("vector")
            .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
            .ok_or_else(|| AppError::Knowledge("Invalid vector column".to_string()))?;

        (0..batch.num_rows())
            .map(|row| {
                let vector_ref = vectors.value(row);
                let values = vector_ref
                    .as_any()
                    .downcast_ref::<Float32Array>()
                    .ok_or_else(|| AppError::Knowledge("Invalid vector values".to_string()))?;

                Ok(KnowledgeChunk {
                    id: id.value(row).to_string(),
                    source_id: source_id.value(row).to_string(),
                    uri: uri.value(row).to_string(),
                    title: (!title.is_null(row)).then(|| title.value(row).to_string()),
                    position: position.value(row),
                    text: text.value(row).to_string(),
                    embedding: Some(values.values().to_vec()),
                })
            })
            .collect()
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> AppResult<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| AppError::Knowledge(format!("Invalid {} column", name)))
}

#[async_trait::async_trait]
impl VectorIndex for LanceDbIndex {
    async fn insert_chunks(&self, chunks: &[KnowledgeChunk]) -> AppResult<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let batch = self.chunks_to_batch(chunks)?;
        let schema = batch.schema();

        self.table
            .add(RecordBatchIterator::new(vec![Ok(batch)], schema))
            .execute()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to add chunks: {}", e)))?;

        tracing::debug!("Inserted {} chunks into LanceDB", chunks.len());
        Ok(())
    }

    async fn delete_source(&self, source_id: &str) -> AppResult<()> {
        // Source ids are hex digests, safe to inline in the predicate.
        self.table
            .delete(&format!("source_id = '{}'", source_id))
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to delete chunks: {}", e)))?;
        Ok(())
    }

    async fn search(&self, query_embedding: &[f32], top_k: usize) -> AppResult<Vec<SearchHit>> {
        if query_embedding.len() != self.embedding_dim {
            return Err(AppError::Knowledge(format!(
                "Query embedding dimension mismatch: expected {}, got {}",
                self.embedding_dim,
                query_embedding.len()
            )));
        }

        if self.count().await? == 0 {
            return Ok(Vec::new());
        }

        let batches: Vec<RecordBatch> = self
            .table
            .query()
            .nearest_to(query_embedding.to_vec())
            .map_err(|e| AppError::Knowledge(format!("Failed to create query: {}", e)))?
            .distance_type(DistanceType::Cosine)
            .limit(top_k)
            .execute()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to execute search: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to collect results: {}", e)))?;

        let mut hits = Vec::new();
        for batch in &batches {
            for chunk in Self::batch_to_chunks(batch)? {
                let score = chunk
                    .embedding
                    .as_deref()
                    .map(|e| cosine_similarity(query_embedding, e))
                    .unwrap_or(0.0);
                hits.push(SearchHit { chunk, score });
            }
        }

        tracing::debug!("LanceDB returned {} hits (top-{})", hits.len(), top_k);

        Ok(rank(hits, top_k))
    }

    async fn count(&self) -> AppResult<usize> {
        self.table
            .count_rows(None)
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to count rows: {}", e)))
    }
}
