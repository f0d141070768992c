//! SQLite-backed vector store.
//!
//! In-process store using SQLite for chunk rows and brute-force cosine
//! similarity for search. Exact, not approximate: fine for a support
//! corpus of a few thousand chunks.

use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::store::{ChunkMetadata, SearchHit, StoredChunk, VectorStore};
use crate::core::config::AppPaths;
use crate::core::errors::ApiError;

pub struct SqliteVectorStore {
    pool: SqlitePool,
    dimension: usize,
}

impl SqliteVectorStore {
    pub async fn new(paths: &AppPaths, dimension: usize) -> Result<Self, ApiError> {
        Self::with_path(paths.db_path.clone(), dimension).await
    }

    pub async fn with_path(db_path: PathBuf, dimension: usize) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        let store = Self { pool, dimension };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chunks (
                chunk_id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                document TEXT NOT NULL,
                page INTEGER NOT NULL,
                section TEXT,
                chunk_index INTEGER NOT NULL,
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document)")
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        let denom = norm_a * norm_b;

        if denom <= f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<(), ApiError> {
        if embedding.len() != self.dimension {
            return Err(ApiError::BadRequest(format!(
                "embedding dimension mismatch: got {}, store is configured for {}",
                embedding.len(),
                self.dimension
            )));
        }
        Ok(())
    }

    fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> StoredChunk {
        StoredChunk {
            chunk_id: row.get("chunk_id"),
            content: row.get("content"),
            metadata: ChunkMetadata {
                document: row.get("document"),
                page: row.get::<i64, _>("page") as u32,
                section: row.get("section"),
                chunk_index: row.get::<i64, _>("chunk_index") as u32,
            },
        }
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn insert_batch(&self, items: Vec<(StoredChunk, Vec<f32>)>) -> Result<(), ApiError> {
        if items.is_empty() {
            return Ok(());
        }

        for (chunk, embedding) in &items {
            if chunk.content.trim().is_empty() {
                return Err(ApiError::BadRequest(format!(
                    "chunk {} has empty content",
                    chunk.chunk_id
                )));
            }
            chunk.metadata.validate()?;
            self.check_dimension(embedding)?;
        }

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        for (chunk, embedding) in &items {
            let blob = Self::serialize_embedding(embedding);

            sqlx::query(
                "INSERT OR REPLACE INTO chunks
                 (chunk_id, content, document, page, section, chunk_index, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .bind(&chunk.chunk_id)
            .bind(&chunk.content)
            .bind(&chunk.metadata.document)
            .bind(chunk.metadata.page as i64)
            .bind(&chunk.metadata.section)
            .bind(chunk.metadata.chunk_index as i64)
            .bind(&blob)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        }

        tx.commit().await.map_err(ApiError::internal)?;
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        match_count: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>, ApiError> {
        self.check_dimension(query_embedding)?;

        let rows = sqlx::query(
            "SELECT chunk_id, content, document, page, section, chunk_index, embedding
             FROM chunks",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        let mut scored: Vec<SearchHit> = rows
            .iter()
            .filter_map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                let stored = Self::deserialize_embedding(&embedding_bytes);
                let similarity = Self::cosine_similarity(query_embedding, &stored);
                if similarity > threshold {
                    Some(SearchHit {
                        chunk: Self::row_to_chunk(row),
                        similarity,
                    })
                } else {
                    None
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(match_count);

        Ok(scored)
    }

    async fn clear(&self) -> Result<usize, ApiError> {
        let result = sqlx::query("DELETE FROM chunks")
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(result.rows_affected() as usize)
    }

    async fn count(&self) -> Result<usize, ApiError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store(dimension: usize) -> SqliteVectorStore {
        let dir = tempfile::tempdir().unwrap().into_path();
        SqliteVectorStore::with_path(dir.join("chunks.db"), dimension)
            .await
            .unwrap()
    }

    fn make_chunk(id: &str, content: &str, document: &str, page: u32, index: u32) -> StoredChunk {
        StoredChunk {
            chunk_id: id.to_string(),
            content: content.to_string(),
            metadata: ChunkMetadata {
                document: document.to_string(),
                page,
                section: None,
                chunk_index: index,
            },
        }
    }

    #[tokio::test]
    async fn insert_and_search_orders_by_similarity() {
        let store = test_store(3).await;

        store
            .insert_batch(vec![
                (make_chunk("c1", "battery chapter", "manual.pdf", 1, 0), vec![1.0, 0.0, 0.0]),
                (make_chunk("c2", "warranty chapter", "manual.pdf", 2, 0), vec![0.7, 0.7, 0.0]),
                (make_chunk("c3", "audio chapter", "manual.pdf", 3, 0), vec![0.0, 0.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = store.search(&[1.0, 0.0, 0.0], 10, 0.3).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.chunk_id, "c1");
        assert_eq!(hits[1].chunk.chunk_id, "c2");
        assert!(hits[0].similarity > hits[1].similarity);

        let limited = store.search(&[1.0, 0.0, 0.0], 1, 0.3).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].chunk.chunk_id, "c1");

        let none = store.search(&[1.0, 0.0, 0.0], 0, 0.3).await.unwrap();
        assert!(none.is_empty(), "a zero match_count must return no hits");
    }

    #[tokio::test]
    async fn search_never_returns_hits_at_or_below_threshold() {
        let store = test_store(2).await;

        store
            .insert_batch(vec![
                (make_chunk("hi", "close match", "doc", 1, 0), vec![1.0, 0.0]),
                (make_chunk("lo", "orthogonal", "doc", 1, 1), vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = store.search(&[1.0, 0.0], 10, 0.0).await.unwrap();
        assert_eq!(hits.len(), 1, "zero-similarity hit must not pass a 0.0 threshold");
        assert_eq!(hits[0].chunk.chunk_id, "hi");
    }

    #[tokio::test]
    async fn rejects_dimension_mismatch_and_empty_content() {
        let store = test_store(4).await;

        let err = store
            .insert_batch(vec![(make_chunk("c1", "ok", "doc", 1, 0), vec![1.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let err = store
            .insert_batch(vec![(make_chunk("c2", "   ", "doc", 1, 0), vec![0.0; 4])])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let err = store
            .insert_batch(vec![(make_chunk("c3", "page zero", "doc", 0, 0), vec![0.0; 4])])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let err = store.search(&[1.0], 5, 0.3).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let store = test_store(2).await;

        store
            .insert_batch(vec![
                (make_chunk("c1", "a chunk", "doc", 1, 0), vec![1.0, 0.0]),
                (make_chunk("c2", "another", "doc", 1, 1), vec![0.0, 1.0]),
            ])
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 2);

        let removed = store.clear().await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
