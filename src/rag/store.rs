//! VectorStore trait — abstract interface for the chunk store.
//!
//! The pipeline only needs batch insert, thresholded nearest-neighbor
//! search, wholesale clear and a count. The primary implementation is
//! `SqliteVectorStore` in the `sqlite` module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

/// Structural metadata attached to every stored chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Opaque document label, used for citation display only.
    pub document: String,
    /// 1-based page number.
    pub page: u32,
    /// Best-effort section heading; advisory, never relied on.
    pub section: Option<String>,
    /// Position of the chunk within its page.
    pub chunk_index: u32,
}

impl ChunkMetadata {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.document.trim().is_empty() {
            return Err(ApiError::BadRequest(
                "chunk metadata: document name is empty".to_string(),
            ));
        }
        if self.page == 0 {
            return Err(ApiError::BadRequest(
                "chunk metadata: page must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// A persisted retrieval unit. `content` is the plain extracted text,
/// never the enriched copy used for embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChunk {
    pub chunk_id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// Result of a similarity search; similarity is cosine, higher is better.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk: StoredChunk,
    pub similarity: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert chunks with their embeddings in one batch. Content and
    /// metadata are validated; the embedding width must match the store's
    /// configured dimension.
    async fn insert_batch(&self, items: Vec<(StoredChunk, Vec<f32>)>) -> Result<(), ApiError>;

    /// Nearest-neighbor search: hits with similarity strictly above
    /// `threshold`, ordered descending, at most `match_count` of them.
    async fn search(
        &self,
        query_embedding: &[f32],
        match_count: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>, ApiError>;

    /// Unconditional delete of all chunks; returns the number removed.
    async fn clear(&self) -> Result<usize, ApiError>;

    /// Total stored chunk count.
    async fn count(&self) -> Result<usize, ApiError>;
}
