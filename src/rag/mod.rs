//! Retrieval-augmented generation pipeline.
//!
//! Offline: `ingest` chunks the corpus, enriches chunk text for embedding
//! and fills the vector store. Online: `engine` expands the query, embeds
//! it, retrieves candidates, re-ranks them with a hybrid vector+keyword
//! score and assembles the cited context handed to the generation model.

pub mod chunker;
pub mod context;
pub mod engine;
pub mod enrich;
pub mod expand;
pub mod ingest;
pub mod rerank;
pub mod sqlite;
pub mod store;

pub use context::{AssembledContext, Source};
pub use engine::RagEngine;
pub use expand::QueryExpander;
pub use ingest::{IngestionPipeline, InlinePages, PageExtractor};
pub use rerank::RetrievalCandidate;
pub use sqlite::SqliteVectorStore;
pub use store::{ChunkMetadata, SearchHit, StoredChunk, VectorStore};
