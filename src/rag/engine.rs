//! Query-time orchestration.
//!
//! One strictly sequential path per query: expand -> embed -> retrieve ->
//! rerank -> assemble. No stage holds mutable shared state, so independent
//! queries can run concurrently. Embedding and search failures abort the
//! query; an empty candidate set is a valid outcome that selects the
//! fallback prompt downstream.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::context::{assemble, AssembledContext};
use super::expand::QueryExpander;
use super::rerank::{rerank, RetrievalCandidate};
use super::store::VectorStore;
use crate::core::config::RagSettings;
use crate::core::errors::ApiError;
use crate::llm::LlmProvider;

pub struct RagEngine {
    provider: Arc<dyn LlmProvider>,
    store: Arc<dyn VectorStore>,
    expander: QueryExpander,
    settings: RagSettings,
    embed_timeout: Duration,
}

impl RagEngine {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        store: Arc<dyn VectorStore>,
        expander: QueryExpander,
        settings: RagSettings,
        embed_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            store,
            expander,
            settings,
            embed_timeout,
        }
    }

    /// Embeds the expanded query and fetches candidates above the raw
    /// similarity threshold, ordered by descending similarity.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievalCandidate>, ApiError> {
        let expanded = self.expander.expand(query);
        if expanded != query {
            debug!(query, expanded, "expanded query before embedding");
        }

        let embedding = self.provider.embed(&expanded, self.embed_timeout).await?;
        let hits = self
            .store
            .search(
                &embedding,
                self.settings.retrieval_top_k,
                self.settings.similarity_threshold,
            )
            .await?;

        debug!(candidates = hits.len(), "retrieval complete");
        Ok(hits.into_iter().map(RetrievalCandidate::from).collect())
    }

    /// Full query-time pipeline; the re-ranker scores against the original
    /// query, not the expanded one.
    pub async fn answer_context(&self, query: &str) -> Result<AssembledContext, ApiError> {
        let candidates = self.retrieve(query).await?;
        let ranked = rerank(
            query,
            candidates,
            self.settings.vector_weight,
            self.settings.keyword_weight,
            self.settings.final_top_n,
        );
        Ok(assemble(&ranked))
    }
}
