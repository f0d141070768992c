//! Corpus ingestion: clear-then-rebuild.
//!
//! The pipeline wipes the vector store, then walks every document page by
//! page: chunk, enrich, embed, insert in batches. A chunk whose embedding
//! call fails is logged and skipped; ingestion of the rest continues.
//! There is no rollback of already-inserted batches, and a query running
//! during re-ingestion may see a partially cleared or partially rebuilt
//! corpus. Callers must serialize concurrent ingestion runs.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use super::chunker::chunk;
use super::enrich::enrich_for_embedding;
use super::store::{ChunkMetadata, StoredChunk, VectorStore};
use crate::core::config::RagSettings;
use crate::core::errors::ApiError;
use crate::llm::LlmProvider;

/// Page extraction collaborator: PDF (or any other) text extraction lives
/// outside this crate; the pipeline only sees per-page text.
#[async_trait]
pub trait PageExtractor: Send + Sync {
    async fn extract_pages(&self, document: &str) -> Result<Vec<String>, ApiError>;
}

/// Extractor over pages that were already produced elsewhere, e.g. posted
/// with the ingest request.
pub struct InlinePages {
    pages: HashMap<String, Vec<String>>,
}

impl InlinePages {
    pub fn new(pages: HashMap<String, Vec<String>>) -> Self {
        Self { pages }
    }
}

#[async_trait]
impl PageExtractor for InlinePages {
    async fn extract_pages(&self, document: &str) -> Result<Vec<String>, ApiError> {
        self.pages
            .get(document)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("no pages supplied for {}", document)))
    }
}

pub struct IngestionPipeline {
    provider: Arc<dyn LlmProvider>,
    store: Arc<dyn VectorStore>,
    settings: RagSettings,
    embed_timeout: Duration,
}

impl IngestionPipeline {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        store: Arc<dyn VectorStore>,
        settings: RagSettings,
        embed_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            store,
            settings,
            embed_timeout,
        }
    }

    /// Rebuilds the corpus from scratch and returns the stored chunk count.
    pub async fn ingest(
        &self,
        extractor: &dyn PageExtractor,
        documents: &[String],
    ) -> Result<usize, ApiError> {
        let cleared = self.store.clear().await?;
        info!(cleared, "cleared vector store for re-ingestion");

        let mut stored = 0usize;
        let mut batch: Vec<(StoredChunk, Vec<f32>)> = Vec::new();

        for document in documents {
            let pages = match extractor.extract_pages(document).await {
                Ok(pages) => pages,
                Err(err) => {
                    warn!(document = %document, error = %err, "skipping document: page extraction failed");
                    continue;
                }
            };
            if pages.is_empty() {
                warn!(document = %document, "skipping document: no readable pages");
                continue;
            }

            stored += self.ingest_document(document, &pages, &mut batch).await?;
        }

        stored += self.flush(&mut batch).await?;
        info!(stored, "ingestion complete");
        Ok(stored)
    }

    async fn ingest_document(
        &self,
        document: &str,
        pages: &[String],
        batch: &mut Vec<(StoredChunk, Vec<f32>)>,
    ) -> Result<usize, ApiError> {
        let mut stored = 0usize;
        let mut section: Option<String> = None;

        for (page_idx, page_text) in pages.iter().enumerate() {
            let page = (page_idx + 1) as u32;

            // Best-effort: headings are detected on raw page text and carried
            // forward until the next one appears.
            if let Some(heading) = detect_section_heading(page_text) {
                section = Some(heading);
            }

            let chunks = chunk(page_text, self.settings.chunk_size, self.settings.overlap_sentences);
            for (chunk_index, chunk_text) in chunks.iter().enumerate() {
                let enriched =
                    enrich_for_embedding(chunk_text, document, page, section.as_deref());

                let embedding = match self.provider.embed(&enriched, self.embed_timeout).await {
                    Ok(vector) => vector,
                    Err(err) => {
                        warn!(
                            document = %document,
                            page,
                            chunk_index,
                            error = %err,
                            "skipping chunk: embedding failed"
                        );
                        continue;
                    }
                };

                batch.push((
                    StoredChunk {
                        chunk_id: Uuid::new_v4().to_string(),
                        content: chunk_text.clone(),
                        metadata: ChunkMetadata {
                            document: document.to_string(),
                            page,
                            section: section.clone(),
                            chunk_index: chunk_index as u32,
                        },
                    },
                    embedding,
                ));

                if batch.len() >= self.settings.insert_batch_size {
                    stored += self.flush(batch).await?;
                }

                if self.settings.embed_delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(self.settings.embed_delay_ms)).await;
                }
            }
        }

        Ok(stored)
    }

    async fn flush(&self, batch: &mut Vec<(StoredChunk, Vec<f32>)>) -> Result<usize, ApiError> {
        if batch.is_empty() {
            return Ok(0);
        }
        let items = std::mem::take(batch);
        let count = items.len();
        self.store.insert_batch(items).await?;
        Ok(count)
    }
}

/// Returns the first header-like line of a page: short, with either an
/// all-caps body or a numbered-heading prefix. Approximate by design.
pub fn detect_section_heading(page_text: &str) -> Option<String> {
    static NUMBERED: OnceLock<Regex> = OnceLock::new();
    let numbered = NUMBERED
        .get_or_init(|| Regex::new(r"^\d+(\.\d+)*[.)]?\s+\S").expect("valid heading regex"));

    for line in page_text.lines() {
        let line = line.trim();
        if line.len() < 4 || line.len() > 60 {
            continue;
        }

        let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
        let all_caps = letters.len() >= 3 && letters.iter().all(|c| c.is_uppercase());

        if all_caps || numbered.is_match(line) {
            return Some(line.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_all_caps_headings() {
        let page = "intro text that is not a heading at all, just prose\nBATTERY AND CHARGING\nbody";
        assert_eq!(
            detect_section_heading(page),
            Some("BATTERY AND CHARGING".to_string())
        );
    }

    #[test]
    fn detects_numbered_headings() {
        let page = "3.2 Scheduled Maintenance\nRotate tires every 10,000 miles.";
        assert_eq!(
            detect_section_heading(page),
            Some("3.2 Scheduled Maintenance".to_string())
        );
    }

    #[test]
    fn ignores_prose_and_long_lines() {
        let page = "This ordinary sentence is definitely not a heading even though it mentions 3 things.\n\
                    ok\n";
        assert_eq!(detect_section_heading(page), None);
    }

    #[tokio::test]
    async fn inline_pages_misses_are_not_found() {
        let extractor = InlinePages::new(HashMap::new());
        let err = extractor.extract_pages("missing.pdf").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
