//! Context block and system prompt assembly.
//!
//! Turns the final ranked candidate set into a numbered, source-attributed
//! context block, the citation list returned to the caller, and the system
//! instruction for the generation model. An empty candidate set switches to
//! a fallback prompt instead of erroring.

use serde::Serialize;

use super::enrich::strip_enrichment_headers;
use super::rerank::RetrievalCandidate;

const SOURCE_SEPARATOR: &str = "\n\n---\n\n";

const GROUNDED_INSTRUCTIONS: &str = "\
You are a friendly, concise customer support assistant.
Answer using only the numbered context excerpts below.
Cite the source of every fact you state, in the form (Source N).
If the context does not contain enough information to answer, say so \
explicitly instead of guessing.
When several excerpts are relevant, synthesize them into one coherent answer.
Prefer an accurate, safe answer over a complete one.";

const FALLBACK_PROMPT: &str = "\
You are a friendly, concise customer support assistant.
No matching documentation was found for this question. Tell the customer \
you could not find anything relevant, list the topics you can help with \
(warranty and coverage, charging and battery care, service and maintenance, \
orders and deliveries, software updates), and invite them to rephrase or \
narrow the question. Do not invent product details.";

/// A caller-facing citation, derived 1:1 from a final candidate.
#[derive(Debug, Clone, Serialize)]
pub struct Source {
    pub document: String,
    pub page: u32,
    pub content: String,
    pub similarity: f32,
}

#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub context_block: String,
    pub sources: Vec<Source>,
    pub system_prompt: String,
}

impl AssembledContext {
    pub fn is_grounded(&self) -> bool {
        !self.sources.is_empty()
    }
}

/// Formats ranked candidates (most relevant first) into the context block
/// and system prompt. Enrichment headers are stripped before the content
/// reaches the prompt or a citation.
pub fn assemble(candidates: &[RetrievalCandidate]) -> AssembledContext {
    if candidates.is_empty() {
        return AssembledContext {
            context_block: String::new(),
            sources: Vec::new(),
            system_prompt: FALLBACK_PROMPT.to_string(),
        };
    }

    let mut sections = Vec::with_capacity(candidates.len());
    let mut sources = Vec::with_capacity(candidates.len());

    for (i, candidate) in candidates.iter().enumerate() {
        let clean = strip_enrichment_headers(&candidate.chunk.content);
        let meta = &candidate.chunk.metadata;

        sections.push(format!(
            "[Source {}: {}, Page {}]\n{}",
            i + 1,
            meta.document,
            meta.page,
            clean
        ));
        sources.push(Source {
            document: meta.document.clone(),
            page: meta.page,
            content: clean,
            similarity: candidate.similarity,
        });
    }

    let context_block = sections.join(SOURCE_SEPARATOR);
    let system_prompt = format!("{}\n\nContext:\n{}", GROUNDED_INSTRUCTIONS, context_block);

    AssembledContext {
        context_block,
        sources,
        system_prompt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::store::{ChunkMetadata, StoredChunk};

    fn candidate(document: &str, page: u32, content: &str, similarity: f32) -> RetrievalCandidate {
        RetrievalCandidate {
            chunk: StoredChunk {
                chunk_id: format!("{}-{}", document, page),
                content: content.to_string(),
                metadata: ChunkMetadata {
                    document: document.to_string(),
                    page,
                    section: None,
                    chunk_index: 0,
                },
            },
            similarity,
            original_similarity: similarity,
            keyword_relevance: 0.0,
        }
    }

    #[test]
    fn empty_candidates_switch_to_fallback() {
        let assembled = assemble(&[]);
        assert!(!assembled.is_grounded());
        assert!(assembled.sources.is_empty());
        assert!(assembled.context_block.is_empty());
        assert!(assembled.system_prompt.contains("could not find"));
        assert!(assembled.system_prompt.contains("warranty"));
    }

    #[test]
    fn candidates_are_numbered_in_rank_order() {
        let assembled = assemble(&[
            candidate("manual.pdf", 42, "Most relevant text.", 0.9),
            candidate("faq.pdf", 3, "Second most relevant.", 0.7),
        ]);

        assert!(assembled.is_grounded());
        assert!(assembled
            .context_block
            .starts_with("[Source 1: manual.pdf, Page 42]\nMost relevant text."));
        assert!(assembled
            .context_block
            .contains("[Source 2: faq.pdf, Page 3]\nSecond most relevant."));
        assert!(assembled.system_prompt.contains(&assembled.context_block));

        assert_eq!(assembled.sources.len(), 2);
        assert_eq!(assembled.sources[0].document, "manual.pdf");
        assert_eq!(assembled.sources[0].page, 42);
        assert!(assembled.sources[0].similarity > assembled.sources[1].similarity);
    }

    #[test]
    fn enrichment_headers_never_leak_into_prompt_or_sources() {
        let leaked = "[Source: manual.pdf, Page 7]\n[Section: BATTERY]\nKeep charge above 20%.";
        let assembled = assemble(&[candidate("manual.pdf", 7, leaked, 0.8)]);

        assert_eq!(assembled.sources[0].content, "Keep charge above 20%.");
        assert!(!assembled.context_block.contains("[Section: BATTERY]"));
        // exactly one source tag: ours, not the leaked one
        assert_eq!(assembled.context_block.matches("[Source").count(), 1);
    }
}
